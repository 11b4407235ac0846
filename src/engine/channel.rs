//! Channel Storage
//!
//! A channel owns five equally long per-sample arrays and the registry of
//! clicks found in it. Detection and repair never touch a `Channel`
//! directly: they work through a [`ChannelSpan`], a view that shares the
//! read-only arrays (input and prediction-error backup) and borrows a
//! contiguous, exclusive window of the mutable ones. Splitting a channel
//! into several spans is what lets scan workers run without locks.

use std::ops::Range;

use crate::engine::click::Click;
use crate::error::{DeclickError, Result};
use crate::settings::ProcessingSettings;

// ============================================================================
// Channel
// ============================================================================

/// One channel of audio plus its detection state
#[derive(Debug, Clone)]
pub struct Channel {
    input: Vec<f32>,
    output: Vec<f32>,
    prediction_error: Vec<f32>,
    prediction_error_backup: Vec<f32>,
    prediction_error_average: Vec<f32>,
    clicks: Vec<Click>,
    /// `(history_length, coefficients_number)` of the last preprocessing
    preprocessed_with: Option<(usize, usize)>,
}

impl Channel {
    /// Create a channel from decoded samples
    ///
    /// The output starts as a copy of the input. Non-finite samples are
    /// rejected because every prediction downstream would inherit them.
    pub fn new(samples: Vec<f32>) -> Result<Self> {
        if let Some(position) = samples.iter().position(|s| !s.is_finite()) {
            return Err(DeclickError::NonFiniteSample { position });
        }

        let len = samples.len();
        Ok(Self {
            output: samples.clone(),
            input: samples,
            prediction_error: vec![0.0; len],
            prediction_error_backup: vec![0.0; len],
            prediction_error_average: vec![0.0; len],
            clicks: Vec::new(),
            preprocessed_with: None,
        })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.input.len()
    }

    /// True if the channel holds no samples
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Whether prediction errors have been computed for the current input
    pub fn is_preprocessed(&self) -> bool {
        self.preprocessed_with.is_some()
    }

    /// Whether the stored errors were computed with this prediction window
    /// and order
    pub fn is_preprocessed_for(&self, settings: &ProcessingSettings) -> bool {
        self.preprocessed_with == Some(prediction_shape(settings))
    }

    // ------------------------------------------------------------------------
    // Per-position access
    // ------------------------------------------------------------------------

    /// Original sample at `position`
    pub fn input(&self, position: usize) -> Option<f32> {
        self.input.get(position).copied()
    }

    /// Replace an original sample
    ///
    /// Invalidates preprocessing. Out-of-range positions and non-finite
    /// values are ignored.
    pub fn set_input(&mut self, position: usize, value: f32) {
        if position < self.len() && value.is_finite() {
            self.input[position] = value;
            self.preprocessed_with = None;
        }
    }

    /// Repaired sample at `position`
    pub fn output(&self, position: usize) -> Option<f32> {
        self.output.get(position).copied()
    }

    /// Overwrite a repaired sample
    pub fn set_output(&mut self, position: usize, value: f32) {
        if let Some(sample) = self.output.get_mut(position) {
            *sample = value;
        }
    }

    /// Prediction error at `position`
    pub fn prediction_error(&self, position: usize) -> Option<f32> {
        self.prediction_error.get(position).copied()
    }

    /// Overwrite a prediction error
    pub fn set_prediction_error(&mut self, position: usize, value: f32) {
        if let Some(error) = self.prediction_error.get_mut(position) {
            *error = value;
        }
    }

    /// Local error average (noise floor) at `position`
    pub fn error_average(&self, position: usize) -> Option<f32> {
        self.prediction_error_average.get(position).copied()
    }

    /// Overwrite a local error average
    pub fn set_error_average(&mut self, position: usize, value: f32) {
        if let Some(average) = self.prediction_error_average.get_mut(position) {
            *average = value;
        }
    }

    /// All original samples
    pub fn input_samples(&self) -> &[f32] {
        &self.input
    }

    /// All repaired samples
    pub fn output_samples(&self) -> &[f32] {
        &self.output
    }

    /// All prediction errors
    pub fn prediction_errors(&self) -> &[f32] {
        &self.prediction_error
    }

    /// All local error averages
    pub fn error_averages(&self) -> &[f32] {
        &self.prediction_error_average
    }

    // ------------------------------------------------------------------------
    // Click registry
    // ------------------------------------------------------------------------

    /// Append a click; ordering is restored with [`Channel::sort_clicks`]
    pub fn add_click(&mut self, click: Click) {
        self.clicks.push(click);
    }

    /// Click at `index`
    pub fn click(&self, index: usize) -> Option<&Click> {
        self.clicks.get(index)
    }

    /// Number of registered clicks
    pub fn click_count(&self) -> usize {
        self.clicks.len()
    }

    /// All registered clicks
    pub fn clicks(&self) -> &[Click] {
        &self.clicks
    }

    /// Drop every registered click
    pub fn clear_clicks(&mut self) {
        self.clicks.clear();
    }

    /// Order clicks by start position
    pub fn sort_clicks(&mut self) {
        self.clicks.sort_by_key(|click| click.start_position());
    }

    pub(crate) fn click_mut(&mut self, index: usize) -> Result<&mut Click> {
        let count = self.clicks.len();
        self.clicks
            .get_mut(index)
            .ok_or(DeclickError::ClickNotFound { index, count })
    }

    // ------------------------------------------------------------------------
    // Scan support
    // ------------------------------------------------------------------------

    /// Input (read-only) and prediction errors (mutable) for preprocessing
    pub(crate) fn input_and_errors_mut(&mut self) -> (&[f32], &mut [f32]) {
        (&self.input, &mut self.prediction_error)
    }

    /// Keep the freshly computed errors so later scans can skip prediction
    pub(crate) fn finish_preprocessing(&mut self, settings: &ProcessingSettings) {
        self.prediction_error_backup
            .copy_from_slice(&self.prediction_error);
        self.preprocessed_with = Some(prediction_shape(settings));
    }

    /// Return to the post-preprocessing state: output equals input, errors
    /// come from the backup, the registry is empty
    pub(crate) fn reset_for_scan(&mut self) {
        self.output.copy_from_slice(&self.input);
        self.prediction_error
            .copy_from_slice(&self.prediction_error_backup);
        self.clicks.clear();
    }

    /// A span over the whole channel
    pub fn span_mut(&mut self) -> ChannelSpan<'_> {
        ChannelSpan {
            offset: 0,
            input: &self.input,
            error_backup: &self.prediction_error_backup,
            output: &mut self.output,
            error: &mut self.prediction_error,
            average: &mut self.prediction_error_average,
        }
    }

    /// Split the channel into consecutive exclusive spans
    ///
    /// `bounds` are the interior cut points, strictly increasing and inside
    /// `(0, len)`; `n` cut points produce `n + 1` spans.
    pub(crate) fn split_spans(&mut self, bounds: &[usize]) -> Vec<ChannelSpan<'_>> {
        let input: &[f32] = &self.input;
        let error_backup: &[f32] = &self.prediction_error_backup;
        let mut output: &mut [f32] = &mut self.output;
        let mut error: &mut [f32] = &mut self.prediction_error;
        let mut average: &mut [f32] = &mut self.prediction_error_average;

        let mut spans = Vec::with_capacity(bounds.len() + 1);
        let mut offset = 0;
        for &cut in bounds {
            let at = cut - offset;
            let (out_head, out_tail) = std::mem::take(&mut output).split_at_mut(at);
            let (err_head, err_tail) = std::mem::take(&mut error).split_at_mut(at);
            let (avg_head, avg_tail) = std::mem::take(&mut average).split_at_mut(at);
            spans.push(ChannelSpan {
                offset,
                input,
                error_backup,
                output: out_head,
                error: err_head,
                average: avg_head,
            });
            output = out_tail;
            error = err_tail;
            average = avg_tail;
            offset = cut;
        }
        spans.push(ChannelSpan {
            offset,
            input,
            error_backup,
            output,
            error,
            average,
        });
        spans
    }
}

fn prediction_shape(settings: &ProcessingSettings) -> (usize, usize) {
    (settings.history_length(), settings.coefficients_number())
}

// ============================================================================
// Channel Span
// ============================================================================

/// Exclusive window `[start, end)` of a channel's mutable arrays
///
/// Positions are absolute channel indices. Input and the error backup stay
/// readable across the whole channel; output, prediction error and error
/// average may only be touched inside the window. Indexing outside it
/// panics, which the scan margins rule out by construction.
#[derive(Debug)]
pub struct ChannelSpan<'a> {
    offset: usize,
    input: &'a [f32],
    error_backup: &'a [f32],
    output: &'a mut [f32],
    error: &'a mut [f32],
    average: &'a mut [f32],
}

impl<'a> ChannelSpan<'a> {
    /// First owned position
    pub fn start(&self) -> usize {
        self.offset
    }

    /// One past the last owned position
    pub fn end(&self) -> usize {
        self.offset + self.output.len()
    }

    /// Length of the underlying channel
    pub fn channel_len(&self) -> usize {
        self.input.len()
    }

    /// Original sample
    #[inline]
    pub fn input(&self, position: usize) -> f32 {
        self.input[position]
    }

    /// Prediction error from preprocessing
    #[inline]
    pub fn backup_error(&self, position: usize) -> f32 {
        self.error_backup[position]
    }

    /// Repaired sample
    #[inline]
    pub fn output(&self, position: usize) -> f32 {
        self.output[position - self.offset]
    }

    #[inline]
    pub fn set_output(&mut self, position: usize, value: f32) {
        self.output[position - self.offset] = value;
    }

    /// The `length` repaired samples ending just before `position`
    #[inline]
    pub fn output_history(&self, position: usize, length: usize) -> &[f32] {
        let end = position - self.offset;
        &self.output[end - length..end]
    }

    /// Current prediction error
    #[inline]
    pub fn error(&self, position: usize) -> f32 {
        self.error[position - self.offset]
    }

    #[inline]
    pub fn set_error(&mut self, position: usize, value: f32) {
        self.error[position - self.offset] = value;
    }

    /// Largest absolute prediction error in `range`
    pub fn peak_error(&self, range: Range<usize>) -> f32 {
        let range = (range.start - self.offset)..(range.end - self.offset);
        self.error[range]
            .iter()
            .fold(0.0f32, |peak, e| peak.max(e.abs()))
    }

    /// Local error average
    #[inline]
    pub fn average(&self, position: usize) -> f32 {
        self.average[position - self.offset]
    }

    /// Write `value` to every average slot in `range`, clipped to the span
    pub fn fill_average(&mut self, range: Range<usize>, value: f32) {
        let end = range.end.min(self.end());
        if range.start >= end {
            return;
        }
        self.average[(range.start - self.offset)..(end - self.offset)].fill(value);
    }

    /// Copy the mutable state in `range` (clipped to the span)
    pub fn snapshot(&self, range: Range<usize>) -> SpanSnapshot {
        let start = range.start.max(self.start());
        let end = range.end.min(self.end()).max(start);
        let local = (start - self.offset)..(end - self.offset);
        SpanSnapshot {
            start,
            output: self.output[local.clone()].to_vec(),
            error: self.error[local.clone()].to_vec(),
            average: self.average[local].to_vec(),
        }
    }

    /// Put back state captured by [`ChannelSpan::snapshot`]
    pub fn restore(&mut self, snapshot: &SpanSnapshot) {
        let local = snapshot.start - self.offset;
        let len = snapshot.output.len();
        self.output[local..local + len].copy_from_slice(&snapshot.output);
        self.error[local..local + len].copy_from_slice(&snapshot.error);
        self.average[local..local + len].copy_from_slice(&snapshot.average);
    }
}

/// Saved output, error and average values for one window
#[derive(Debug, Clone, PartialEq)]
pub struct SpanSnapshot {
    start: usize,
    output: Vec<f32>,
    error: Vec<f32>,
    average: Vec<f32>,
}

impl SpanSnapshot {
    /// Covered positions
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.output.len()
    }
}
