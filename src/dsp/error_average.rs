//! Error-Average Tracker
//!
//! The local noise floor against which prediction errors are judged. For a
//! position `q` the preceding `history_length` errors are cut into 16-sample
//! blocks; the floor is the mean of the blocks' peak magnitudes.
//!
//! Refreshing a range slides block by block: the block entering the window
//! is added, the block leaving it subtracted, and the value computed at each
//! block start is written to all 16 slots of that block. The stored average
//! is therefore a step function aligned to absolute multiples of 16.

use std::ops::Range;

use crate::engine::ChannelSpan;

/// Samples per tracker block
pub const BLOCK_SIZE: usize = 16;

/// Smallest error average ever stored
pub const ERROR_AVERAGE_FLOOR: f64 = 1e-6;

/// Sliding block-peak baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorAverageTracker {
    history_length: usize,
}

impl ErrorAverageTracker {
    /// Create a tracker over `history_length` errors (a multiple of 16)
    pub fn new(history_length: usize) -> Self {
        debug_assert!(history_length % BLOCK_SIZE == 0);
        Self { history_length }
    }

    /// Blocks per window
    pub fn blocks(&self) -> usize {
        self.history_length / BLOCK_SIZE
    }

    /// Error average at `position`, computed from scratch in O(history)
    pub fn average_at(&self, span: &ChannelSpan<'_>, position: usize) -> f64 {
        self.floored(self.peak_sum(span, position))
    }

    /// Recompute the stored averages over `range`
    ///
    /// The range is widened down to a block boundary and clipped to the
    /// span; the final block is written in full when it fits.
    pub fn refresh(&self, span: &mut ChannelSpan<'_>, range: Range<usize>) {
        let start = align_down(range.start.max(span.start()));
        let end = range.end.min(span.end());
        if start >= end {
            return;
        }

        let mut sum = self.peak_sum(span, start);
        span.fill_average(start..start + BLOCK_SIZE, self.floored(sum) as f32);

        let mut block = start + BLOCK_SIZE;
        while block < end {
            let entering = block - BLOCK_SIZE;
            sum += span.peak_error(entering..block) as f64;
            if let Some(leaving) = entering.checked_sub(self.history_length) {
                sum -= span.peak_error(leaving..leaving + BLOCK_SIZE) as f64;
            }
            span.fill_average(block..block + BLOCK_SIZE, self.floored(sum) as f32);
            block += BLOCK_SIZE;
        }
    }

    /// Sum of block peaks in the window before `position`; blocks that would
    /// start before the channel contribute nothing
    fn peak_sum(&self, span: &ChannelSpan<'_>, position: usize) -> f64 {
        (0..self.blocks())
            .filter_map(|k| (position + k * BLOCK_SIZE).checked_sub(self.history_length))
            .map(|block| span.peak_error(block..block + BLOCK_SIZE) as f64)
            .sum()
    }

    fn floored(&self, sum: f64) -> f64 {
        (sum / self.blocks() as f64).max(ERROR_AVERAGE_FLOOR)
    }
}

/// Round down to a block boundary
#[inline]
pub fn align_down(position: usize) -> usize {
    position - position % BLOCK_SIZE
}
