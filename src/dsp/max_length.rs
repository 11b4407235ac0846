//! Max-Length Estimator
//!
//! Rough ceiling on a damaged run's length, used only to bound the length
//! search. Walks forward in steps of three samples while the error stays
//! above the local baseline, then scales the step count by the detection
//! ratio.

use crate::dsp::detector::{detection_ratio, BASELINE_LOOKBACK};
use crate::engine::ChannelSpan;

/// Samples advanced per step
pub const STEP: usize = 3;

/// Upper bound on the length of the run starting at `position`
///
/// Always in `1..=max_correction_length`.
pub fn estimate_max_length(span: &ChannelSpan<'_>, position: usize, max_correction_length: usize) -> usize {
    let baseline = span.average(position - BASELINE_LOOKBACK) as f64;
    let ratio = detection_ratio(span.error(position) as f64, baseline);

    let mut steps = 1usize;
    let mut q = position + STEP;
    while q < span.end() && steps * STEP < max_correction_length && (span.error(q).abs() as f64) > baseline {
        steps += 1;
        q += STEP;
    }

    let estimate = (steps as f64 * ratio * 2.0).ceil();
    if estimate >= max_correction_length as f64 {
        max_correction_length
    } else {
        (estimate as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Channel;
    use test_case::test_case;

    fn channel(errors: &[(usize, f32)], baseline: f32) -> Channel {
        let mut channel = Channel::new(vec![0.0; 256]).unwrap();
        for p in 0..256 {
            channel.set_error_average(p, baseline);
        }
        for &(p, e) in errors {
            channel.set_prediction_error(p, e);
        }
        channel
    }

    #[test]
    fn test_single_step() {
        // ratio 2, one step: ceil(1 * 2 * 2) = 4
        let mut channel = channel(&[(100, 0.2)], 0.1);
        let span = channel.span_mut();
        assert_eq!(estimate_max_length(&span, 100, 250), 4);
    }

    #[test]
    fn test_counts_steps_above_baseline() {
        // Errors above baseline at +3 and +6, not at +9: three steps
        let mut channel = channel(&[(100, 0.2), (103, 0.15), (106, -0.3)], 0.1);
        let span = channel.span_mut();
        assert_eq!(estimate_max_length(&span, 100, 250), 12);
    }

    #[test_case(0.5, 250, 250 ; "large ratio clamps")]
    #[test_case(0.5, 7, 7 ; "small ceiling clamps")]
    #[test_case(0.0, 250, 1 ; "zero error still yields one")]
    fn test_clamped(error: f32, max_correction: usize, expected: usize) {
        let mut channel = channel(&[(100, error)], 0.001);
        let span = channel.span_mut();
        assert_eq!(estimate_max_length(&span, 100, max_correction), expected);
    }
}
