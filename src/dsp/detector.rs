//! Click Detector
//!
//! A sample is suspicious when its prediction error towers over the local
//! noise floor. The floor is read 15 samples back so that a transient's own
//! onset never raises the baseline it is measured against.

use crate::engine::ChannelSpan;
use crate::settings::ProcessingSettings;

/// Distance between a sample and the baseline it is compared to
pub const BASELINE_LOOKBACK: usize = 15;

/// Detection ratio: error magnitude over baseline
///
/// `baseline` is always positive because stored averages are floored.
#[inline]
pub fn detection_ratio(error: f64, baseline: f64) -> f64 {
    error.abs() / baseline
}

/// Threshold test on prediction error against the error average
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickDetector {
    threshold: f64,
    warmup: usize,
}

impl ClickDetector {
    /// Create a detector from the settings in effect
    pub fn new(settings: &ProcessingSettings) -> Self {
        Self {
            threshold: settings.detection_threshold() as f64,
            // Errors start at one history length and the average needs a
            // further history length of them
            warmup: 2 * settings.history_length() + BASELINE_LOOKBACK,
        }
    }

    /// Ratio threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// First position whose baseline is fully established
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Detection ratio at `position`
    pub fn ratio(&self, span: &ChannelSpan<'_>, position: usize) -> f64 {
        detection_ratio(
            span.error(position) as f64,
            span.average(position - BASELINE_LOOKBACK) as f64,
        )
    }

    /// True if `position` looks damaged
    pub fn is_suspicious(&self, span: &ChannelSpan<'_>, position: usize) -> bool {
        position >= self.warmup && self.ratio(span, position) > self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Channel;

    fn settings() -> ProcessingSettings {
        ProcessingSettings::new(64, 4).unwrap()
    }

    #[test]
    fn test_ratio_is_monotonic_in_error() {
        let mut previous = -1.0;
        for step in 0..50 {
            let error = step as f64 * 0.01;
            let ratio = detection_ratio(-error, 0.02);
            assert!(ratio >= previous);
            previous = ratio;
        }
    }

    #[test]
    fn test_threshold_uses_lookback_baseline() {
        let settings = settings();
        let detector = ClickDetector::new(&settings);
        let mut channel = Channel::new(vec![0.0; 512]).unwrap();
        let p = 300;
        channel.set_error_average(p - BASELINE_LOOKBACK, 0.01);
        channel.set_error_average(p, 1.0);
        channel.set_prediction_error(p, 0.2);

        let span = channel.span_mut();
        assert_eq!(detector.ratio(&span, p), 0.2f32 as f64 / 0.01f32 as f64);
        assert!(detector.is_suspicious(&span, p));
    }

    #[test]
    fn test_below_threshold_is_clean() {
        let detector = ClickDetector::new(&settings());
        let mut channel = Channel::new(vec![0.0; 512]).unwrap();
        let p = 300;
        channel.set_error_average(p - BASELINE_LOOKBACK, 0.1);
        channel.set_prediction_error(p, -0.5);

        let span = channel.span_mut();
        assert!(!detector.is_suspicious(&span, p));
    }

    #[test]
    fn test_no_detection_during_warmup() {
        let detector = ClickDetector::new(&settings());
        assert_eq!(detector.warmup(), 2 * 64 + BASELINE_LOOKBACK);

        let mut channel = Channel::new(vec![0.0; 512]).unwrap();
        let p = detector.warmup() - 1;
        channel.set_error_average(p - BASELINE_LOOKBACK, 0.001);
        channel.set_prediction_error(p, 1.0);

        let span = channel.span_mut();
        assert!(!detector.is_suspicious(&span, p));
    }
}
