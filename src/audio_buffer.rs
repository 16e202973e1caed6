//! Interleaved audio buffer storage and per-channel views.
//!
//! This module provides the container that backs every block of audio handled by the core:
//!
//! - [`AudioBuffer`]: owned, fixed-shape, interleaved sample storage
//! - [`ChannelView`] / [`ChannelViewMut`]: bounds-checked, non-owning views over a single channel
//!
//! Samples for all channels at a given frame are contiguous (`[ch0_f0, ch1_f0, ch0_f1, ch1_f1, ...]`),
//! so the stride between two successive samples of the same channel equals the channel count. Hot
//! DSP loops can bypass bounds checks with [`AudioBuffer::at_unchecked`], or with a channel's raw
//! strided span once indices have been validated once.

use std::fmt;
use std::num::NonZeroUsize;
use std::ops;
use zerocopy::FromZeros;

/// Sample type used throughout the core.
pub type Sample = f32;

/// Errors raised by bounds-checked [`AudioBuffer`]/[`ChannelView`] access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Requested channel index is not present in the buffer.
    #[error("channel {channel} out of range (buffer has {num_channels} channel(s))")]
    ChannelOutOfRange {
        /// Index that was requested.
        channel: usize,
        /// Number of channels actually present.
        num_channels: usize,
    },
    /// Requested frame index is not present in the buffer.
    #[error("frame {frame} out of range (buffer has {num_frames} frame(s))")]
    FrameOutOfRange {
        /// Index that was requested.
        frame: usize,
        /// Number of frames actually present.
        num_frames: usize,
    },
}

/// Owned, interleaved, fixed-shape audio buffer.
///
/// The buffer's dimensions never change after construction. Storage is a single contiguous
/// allocation of `num_channels * num_frames` samples, laid out frame-major: the sample for
/// channel `c` at frame `f` lives at `data[f * num_channels + c]`.
#[derive(Clone)]
pub struct AudioBuffer {
    data: Box<[Sample]>,
    channels: NonZeroUsize,
    frames: usize,
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("channels", &self.channels.get())
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl AudioBuffer {
    /// Allocates a zero-filled buffer with the given shape.
    pub fn new(channels: NonZeroUsize, frames: usize) -> Self {
        let len = channels.get() * frames;
        let data = <[Sample] as FromZeros>::new_box_zeroed_with_elems(len)
            .expect("failed to allocate audio buffer");
        Self {
            data,
            channels,
            frames,
        }
    }

    /// Builds a buffer of the given shape by copying from an interleaved source iterator. A
    /// short source leaves trailing samples zeroed; extra source samples are dropped.
    pub fn from_interleaved(
        channels: NonZeroUsize,
        frames: usize,
        source: impl IntoIterator<Item = Sample>,
    ) -> Self {
        let mut buffer = Self::new(channels, frames);
        buffer.copy_from(source);
        buffer
    }

    /// Number of channels in this buffer. Always greater than zero.
    pub fn num_channels(&self) -> usize {
        self.channels.get()
    }

    /// Number of frames in this buffer.
    pub fn num_frames(&self) -> usize {
        self.frames
    }

    /// Total number of samples (`num_channels * num_frames`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the buffer holds zero frames.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Distance, in samples, between two successive frames of the same channel. Equals
    /// [`Self::num_channels`].
    pub fn interleave_stride(&self) -> usize {
        self.channels.get()
    }

    #[inline]
    fn index_of(&self, channel: usize, frame: usize) -> Result<usize, BufferError> {
        if channel >= self.channels.get() {
            return Err(BufferError::ChannelOutOfRange {
                channel,
                num_channels: self.channels.get(),
            });
        }
        if frame >= self.frames {
            return Err(BufferError::FrameOutOfRange {
                frame,
                num_frames: self.frames,
            });
        }
        Ok(frame * self.channels.get() + channel)
    }

    /// Bounds-checked read of the sample at `(channel, frame)`.
    pub fn at(&self, channel: usize, frame: usize) -> Result<Sample, BufferError> {
        self.index_of(channel, frame).map(|i| self.data[i])
    }

    /// Bounds-checked write of the sample at `(channel, frame)`.
    pub fn set(&mut self, channel: usize, frame: usize, value: Sample) -> Result<(), BufferError> {
        let i = self.index_of(channel, frame)?;
        self.data[i] = value;
        Ok(())
    }

    /// Reads the sample at `(channel, frame)` without bounds checking.
    ///
    /// # Safety
    ///
    /// `channel < self.num_channels()` and `frame < self.num_frames()` must both hold.
    #[inline]
    pub unsafe fn at_unchecked(&self, channel: usize, frame: usize) -> Sample {
        let i = frame * self.channels.get() + channel;
        unsafe { *self.data.get_unchecked(i) }
    }

    /// Writes the sample at `(channel, frame)` without bounds checking.
    ///
    /// # Safety
    ///
    /// `channel < self.num_channels()` and `frame < self.num_frames()` must both hold.
    #[inline]
    pub unsafe fn set_unchecked(&mut self, channel: usize, frame: usize, value: Sample) {
        let i = frame * self.channels.get() + channel;
        unsafe {
            *self.data.get_unchecked_mut(i) = value;
        }
    }

    /// Base pointer to the interleaved storage.
    pub fn data_ptr(&self) -> *const Sample {
        self.data.as_ptr()
    }

    /// Mutable base pointer to the interleaved storage.
    pub fn data_ptr_mut(&mut self) -> *mut Sample {
        self.data.as_mut_ptr()
    }

    /// Immutable interleaved slice of the whole buffer.
    pub fn as_interleaved_slice(&self) -> &[Sample] {
        &self.data
    }

    /// Mutable interleaved slice of the whole buffer.
    pub fn as_interleaved_slice_mut(&mut self) -> &mut [Sample] {
        &mut self.data
    }

    /// Returns a bounds-checked, read-only view over a single channel.
    pub fn channel(&self, channel: usize) -> Result<ChannelView<'_>, BufferError> {
        if channel >= self.channels.get() {
            return Err(BufferError::ChannelOutOfRange {
                channel,
                num_channels: self.channels.get(),
            });
        }
        Ok(ChannelView {
            buffer: self,
            channel,
        })
    }

    /// Returns a bounds-checked, mutable view over a single channel.
    pub fn channel_mut(&mut self, channel: usize) -> Result<ChannelViewMut<'_>, BufferError> {
        if channel >= self.channels.get() {
            return Err(BufferError::ChannelOutOfRange {
                channel,
                num_channels: self.channels.get(),
            });
        }
        Ok(ChannelViewMut {
            buffer: self,
            channel,
        })
    }

    /// Sets every sample in the buffer to `value`.
    pub fn fill(&mut self, value: Sample) {
        self.data.fill(value);
    }

    /// Multiplies every sample in the buffer by `gain`.
    pub fn apply_gain(&mut self, gain: Sample) {
        for s in self.data.iter_mut() {
            *s *= gain;
        }
    }

    /// Overwrites the leading samples of this buffer (in interleaved order) from `source`.
    /// Extra source samples beyond the buffer's capacity are ignored; a short source leaves the
    /// remaining samples untouched. The buffer's shape never changes.
    pub fn copy_from(&mut self, source: impl IntoIterator<Item = Sample>) {
        for (dst, src) in self.data.iter_mut().zip(source) {
            *dst = src;
        }
    }

    /// Copies this buffer's interleaved contents into `output`. Only `min(self.len(),
    /// output.len())` samples are written.
    pub fn copy_into_interleaved(&self, output: &mut [Sample]) {
        let n = self.data.len().min(output.len());
        output[..n].copy_from_slice(&self.data[..n]);
    }
}

impl ops::Index<(usize, usize)> for AudioBuffer {
    type Output = Sample;

    /// Panics if `(channel, frame)` is out of range. Use [`AudioBuffer::at`] for a fallible
    /// equivalent.
    fn index(&self, (channel, frame): (usize, usize)) -> &Sample {
        let i = self
            .index_of(channel, frame)
            .unwrap_or_else(|e| panic!("{e}"));
        &self.data[i]
    }
}

impl ops::IndexMut<(usize, usize)> for AudioBuffer {
    fn index_mut(&mut self, (channel, frame): (usize, usize)) -> &mut Sample {
        let i = self
            .index_of(channel, frame)
            .unwrap_or_else(|e| panic!("{e}"));
        &mut self.data[i]
    }
}

#[duplicate::duplicate_item(
    name              reference(lifetime, type);
    [ChannelView]     [&'lifetime type];
    [ChannelViewMut]  [&'lifetime mut type];
)]
/// Non-owning, bounds-checked view over a single channel of an [`AudioBuffer`].
pub struct name<'a> {
    buffer: reference([a], [AudioBuffer]),
    channel: usize,
}

#[duplicate::duplicate_item(
    name;
    [ChannelView];
    [ChannelViewMut];
)]
impl<'a> name<'a> {
    /// Number of frames in the parent buffer.
    pub fn size(&self) -> usize {
        self.buffer.num_frames()
    }

    /// Bounds-checked read at frame `i` of this channel.
    pub fn get(&self, i: usize) -> Result<Sample, BufferError> {
        self.buffer.at(self.channel, i)
    }

    /// Returns an unchecked `(ptr, num_frames, stride)` span for hot DSP loops. Element `i` of
    /// the channel is `ptr.add(i * stride)`.
    pub fn raw(&self) -> (*const Sample, usize, usize) {
        let stride = self.buffer.interleave_stride();
        // SAFETY: `self.channel` was validated against the buffer's channel count at
        // construction time (`AudioBuffer::channel`/`channel_mut`).
        let ptr = unsafe { self.buffer.data_ptr().add(self.channel) };
        (ptr, self.buffer.num_frames(), stride)
    }

    /// Forward, strided iterator over this channel's samples in frame order.
    pub fn iter(&self) -> ChannelIter<'_> {
        let (ptr, frames, stride) = self.raw();
        ChannelIter {
            ptr,
            remaining: frames,
            stride,
            _marker: std::marker::PhantomData,
        }
    }
}

impl ops::Index<usize> for ChannelView<'_> {
    type Output = Sample;
    fn index(&self, i: usize) -> &Sample {
        &self.buffer[(self.channel, i)]
    }
}

impl ops::Index<usize> for ChannelViewMut<'_> {
    type Output = Sample;
    fn index(&self, i: usize) -> &Sample {
        &self.buffer[(self.channel, i)]
    }
}

impl ChannelViewMut<'_> {
    /// Bounds-checked write at frame `i` of this channel.
    pub fn set(&mut self, i: usize, value: Sample) -> Result<(), BufferError> {
        self.buffer.set(self.channel, i, value)
    }

    /// Returns an unchecked, mutable `(ptr, num_frames, stride)` span for hot DSP loops.
    pub fn raw_mut(&mut self) -> (*mut Sample, usize, usize) {
        let stride = self.buffer.interleave_stride();
        // SAFETY: see `raw()` above.
        let ptr = unsafe { self.buffer.data_ptr_mut().add(self.channel) };
        (ptr, self.buffer.num_frames(), stride)
    }

    /// Sets every sample of this channel to `value`.
    pub fn fill(&mut self, value: Sample) {
        let (ptr, frames, stride) = self.raw_mut();
        for i in 0..frames {
            // SAFETY: `i < frames` and the span came from a validated channel.
            unsafe { *ptr.add(i * stride) = value };
        }
    }

    /// Multiplies every sample of this channel by `gain`.
    pub fn apply_gain(&mut self, gain: Sample) {
        let (ptr, frames, stride) = self.raw_mut();
        for i in 0..frames {
            // SAFETY: see `fill`.
            unsafe {
                let slot = ptr.add(i * stride);
                *slot *= gain;
            }
        }
    }

    /// Overwrites the leading samples of this channel from `source`. Extra source samples are
    /// ignored; a short source leaves the remaining samples untouched.
    pub fn copy_from(&mut self, source: impl IntoIterator<Item = Sample>) {
        let (ptr, frames, stride) = self.raw_mut();
        for (i, value) in (0..frames).zip(source) {
            // SAFETY: see `fill`.
            unsafe { *ptr.add(i * stride) = value };
        }
    }

    /// Forward, strided, mutable iterator over this channel's samples in frame order.
    pub fn iter_mut(&mut self) -> ChannelIterMut<'_> {
        let (ptr, frames, stride) = self.raw_mut();
        ChannelIterMut {
            ptr,
            remaining: frames,
            stride,
            _marker: std::marker::PhantomData,
        }
    }
}

impl ops::IndexMut<usize> for ChannelViewMut<'_> {
    fn index_mut(&mut self, i: usize) -> &mut Sample {
        &mut self.buffer[(self.channel, i)]
    }
}

/// Strided, read-only iterator over a channel's samples, produced by [`ChannelView::iter`].
pub struct ChannelIter<'a> {
    ptr: *const Sample,
    remaining: usize,
    stride: usize,
    _marker: std::marker::PhantomData<&'a Sample>,
}

impl<'a> Iterator for ChannelIter<'a> {
    type Item = &'a Sample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        // SAFETY: `ptr` walks exactly `remaining` valid, stride-spaced elements of the channel
        // this iterator was built from.
        let item = unsafe { &*self.ptr };
        self.ptr = unsafe { self.ptr.add(self.stride) };
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ChannelIter<'_> {}

/// Strided, mutable iterator over a channel's samples, produced by [`ChannelViewMut::iter_mut`].
pub struct ChannelIterMut<'a> {
    ptr: *mut Sample,
    remaining: usize,
    stride: usize,
    _marker: std::marker::PhantomData<&'a mut Sample>,
}

impl<'a> Iterator for ChannelIterMut<'a> {
    type Item = &'a mut Sample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        // SAFETY: see `ChannelIter::next`; each step produces a disjoint element so the mutable
        // aliasing rule holds across the iteration.
        let item = unsafe { &mut *self.ptr };
        self.ptr = unsafe { self.ptr.add(self.stride) };
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ChannelIterMut<'_> {}
