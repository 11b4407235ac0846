//! Click Repairer
//!
//! Regenerates a damaged run from its left context. Each sample is replaced
//! by the forward prediction of the *output* buffer, so later samples in the
//! run see the earlier repairs. A few trailing errors are then recomputed to
//! expose whether the right boundary is clean, and the error average is
//! refreshed one history length either side.

use crate::dsp::burg::BurgPredictor;
use crate::dsp::detector::{detection_ratio, BASELINE_LOOKBACK};
use crate::dsp::error_average::ErrorAverageTracker;
use crate::engine::ChannelSpan;
use crate::error::{DeclickError, Result};
use crate::settings::ProcessingSettings;

/// Placeholder error stored for repaired samples
pub const REPAIRED_ERROR: f32 = 0.001;

/// Errors recomputed past the end of a repaired run
pub const TRAILING_SAMPLES: usize = 5;

/// Repair primitive shared by the length finder and click resizing
#[derive(Debug, Clone)]
pub struct ClickRepairer {
    predictor: BurgPredictor,
    tracker: ErrorAverageTracker,
    history_length: usize,
}

impl ClickRepairer {
    pub fn new(settings: &ProcessingSettings) -> Self {
        let history_length = settings.history_length();
        Self {
            predictor: BurgPredictor::new(settings.coefficients_number(), history_length),
            tracker: ErrorAverageTracker::new(history_length),
            history_length,
        }
    }

    /// Replace `[position, position + length)` with predictions
    ///
    /// # Arguments
    /// * `span` - Window owning the run plus one history length either side
    /// * `position` - First damaged sample
    /// * `length` - Damaged samples; zero only refreshes the boundary
    ///
    /// # Returns
    /// Detection ratio at `position` against the refreshed baseline
    pub fn repair(&mut self, span: &mut ChannelSpan<'_>, position: usize, length: usize) -> Result<f64> {
        let end = position + length;
        for p in position..end {
            let prediction = self
                .predictor
                .predict(span.output_history(p, self.history_length))
                .ok_or(DeclickError::NumericalFailure { position: p })?;
            span.set_output(p, prediction.forward as f32);
            span.set_error(p, REPAIRED_ERROR);
        }

        let trailing_end = (end + TRAILING_SAMPLES).min(span.end());
        self.recompute_errors(span, end, trailing_end)?;
        self.refresh_around(span, position, end);

        Ok(self.detection_ratio(span, position))
    }

    /// Put the original input back over `[position, position + length)`
    ///
    /// The trailing errors return to their preprocessed values along with
    /// the samples, stopping at `limit` so a repaired neighbour keeps its
    /// own state. Pass `usize::MAX` when nothing follows.
    ///
    /// # Returns
    /// Detection ratio at `position`
    pub fn restore(
        &mut self,
        span: &mut ChannelSpan<'_>,
        position: usize,
        length: usize,
        limit: usize,
    ) -> f64 {
        let run_end = position + length;
        let end = (run_end + TRAILING_SAMPLES)
            .min(limit.max(run_end))
            .min(span.end());
        for p in position..end {
            span.set_output(p, span.input(p));
            span.set_error(p, span.backup_error(p));
        }
        self.refresh_around(span, position, position + length);

        self.detection_ratio(span, position)
    }

    /// Preprocessed error at `position` over the current baseline
    ///
    /// The stored error of a repaired sample is only a placeholder, so the
    /// backup is used to rate how strong the damage was.
    pub fn detection_ratio(&self, span: &ChannelSpan<'_>, position: usize) -> f64 {
        detection_ratio(
            span.backup_error(position) as f64,
            span.average(position - BASELINE_LOOKBACK) as f64,
        )
    }

    /// Recompute prediction errors over `[from, to)` from the output buffer
    pub fn recompute_errors(&mut self, span: &mut ChannelSpan<'_>, from: usize, to: usize) -> Result<()> {
        for q in from..to {
            let prediction = self
                .predictor
                .predict(span.output_history(q, self.history_length))
                .ok_or(DeclickError::NumericalFailure { position: q })?;
            let error = span.output(q) as f64 - prediction.forward;
            span.set_error(q, error as f32);
        }
        Ok(())
    }

    fn refresh_around(&self, span: &mut ChannelSpan<'_>, start: usize, end: usize) {
        let from = start.saturating_sub(self.history_length);
        self.tracker.refresh(span, from..end + self.history_length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Channel;
    use approx::assert_abs_diff_eq;

    fn settings() -> ProcessingSettings {
        ProcessingSettings::new(64, 4).unwrap()
    }

    /// Constant 0.5 with a zeroed run at `onset`, errors preprocessed
    fn damaged_channel(len: usize, onset: usize, run: usize) -> Channel {
        let mut samples = vec![0.5f32; len];
        samples[onset..onset + run].fill(0.0);
        let mut channel = Channel::new(samples).unwrap();

        let mut repairer = ClickRepairer::new(&settings());
        {
            let mut span = channel.span_mut();
            repairer.recompute_errors(&mut span, 64, len).unwrap();
        }
        channel.finish_preprocessing(&settings());
        channel
    }

    #[test]
    fn test_repair_fills_from_context() {
        let mut channel = damaged_channel(512, 300, 6);
        let mut repairer = ClickRepairer::new(&settings());
        let mut span = channel.span_mut();

        repairer.repair(&mut span, 300, 6).unwrap();

        for p in 300..306 {
            assert_abs_diff_eq!(span.output(p), 0.5, epsilon = 1e-6);
            assert_eq!(span.error(p), REPAIRED_ERROR);
        }
        // The boundary past the run is clean again
        for p in 306..306 + TRAILING_SAMPLES {
            assert!(span.error(p).abs() < 1e-6);
        }
    }

    #[test]
    fn test_repair_is_idempotent() {
        let mut channel = damaged_channel(512, 300, 6);
        let mut repairer = ClickRepairer::new(&settings());

        let first = {
            let mut span = channel.span_mut();
            repairer.repair(&mut span, 300, 6).unwrap()
        };
        let output = channel.output_samples().to_vec();
        let averages = channel.error_averages().to_vec();

        let second = {
            let mut span = channel.span_mut();
            repairer.repair(&mut span, 300, 6).unwrap()
        };

        assert_eq!(first, second);
        assert_eq!(channel.output_samples(), &output[..]);
        assert_eq!(channel.error_averages(), &averages[..]);
    }

    #[test]
    fn test_restore_brings_back_input() {
        let mut channel = damaged_channel(512, 300, 6);
        let mut repairer = ClickRepairer::new(&settings());
        let mut span = channel.span_mut();

        repairer.repair(&mut span, 300, 6).unwrap();
        let ratio = repairer.restore(&mut span, 300, 6, usize::MAX);

        for p in 300..311 {
            assert_eq!(span.output(p), span.input(p));
            assert_eq!(span.error(p), span.backup_error(p));
        }
        assert!(ratio > 10.0);
    }

    #[test]
    fn test_restore_stops_at_next_repair() {
        let mut channel = damaged_channel(512, 300, 6);
        channel.set_input(308, 0.0);
        channel.set_input(309, 0.0);
        let mut repairer = ClickRepairer::new(&settings());
        {
            let mut span = channel.span_mut();
            repairer.recompute_errors(&mut span, 64, 512).unwrap();
        }
        channel.finish_preprocessing(&settings());
        let mut span = channel.span_mut();

        repairer.repair(&mut span, 300, 6).unwrap();
        repairer.repair(&mut span, 308, 2).unwrap();
        repairer.restore(&mut span, 300, 6, 308);

        for p in 300..308 {
            assert_eq!(span.output(p), span.input(p));
            assert_eq!(span.error(p), span.backup_error(p));
        }
        // The neighbouring repair is untouched
        for p in 308..310 {
            assert_abs_diff_eq!(span.output(p), 0.5, epsilon = 1e-6);
            assert_eq!(span.error(p), REPAIRED_ERROR);
        }
    }

    #[test]
    fn test_detection_ratio_reads_backup() {
        let mut channel = damaged_channel(512, 300, 6);
        let mut repairer = ClickRepairer::new(&settings());
        let mut span = channel.span_mut();

        let ratio = repairer.repair(&mut span, 300, 6).unwrap();
        // Placeholder error would give a tiny ratio; the backup keeps 0.5
        assert_eq!(ratio, repairer.detection_ratio(&span, 300));
        assert!(ratio > 1000.0);
    }

    #[test]
    fn test_zero_length_repair_only_refreshes() {
        let mut channel = damaged_channel(512, 300, 6);
        let before = channel.output_samples().to_vec();
        let mut repairer = ClickRepairer::new(&settings());
        {
            let mut span = channel.span_mut();
            repairer.repair(&mut span, 400, 0).unwrap();
        }
        assert_eq!(channel.output_samples(), &before[..]);
    }
}
