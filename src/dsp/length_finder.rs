//! Click Length Finder
//!
//! Fits the boundaries of a damaged run around a suspicious sample. Every
//! candidate start from the suspicious sample back to ten samples earlier is
//! tried with a repair-and-grow trial; the trial's writes are rolled back
//! before the next candidate, and the winner is repaired for real at the end.
//!
//! Candidates are ranked with [`TrialResult::better_than`], a hand-tuned
//! rule that is *not* a total order. The search keeps whichever result the
//! rule prefers as it walks the candidates, so the visiting order matters.

use tracing::trace;

use crate::dsp::detector::ClickDetector;
use crate::dsp::error_average::BLOCK_SIZE;
use crate::dsp::repair::{ClickRepairer, TRAILING_SAMPLES};
use crate::engine::ChannelSpan;
use crate::error::Result;
use crate::settings::ProcessingSettings;

/// Candidate starts tried before the suspicious sample
pub const SEARCH_BACKTRACK: usize = 10;

/// Samples past the boundary that must not be suspicious
pub const BOUNDARY_CHECK: usize = 3;

/// Samples past the boundary whose errors must settle
pub const SETTLE_SAMPLES: usize = 4;

/// Settled when the summed error magnitude falls below this
pub const SETTLE_LIMIT: f64 = 0.01;

/// Error-sum ratio under which a result wins regardless of length
pub const DOMINANCE_RATIO: f64 = 0.01;

// ============================================================================
// Results
// ============================================================================

/// Outcome of one repair-and-grow trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialResult {
    pub success: bool,
    pub start: usize,
    pub length: usize,
    pub error_sum: f64,
}

impl TrialResult {
    /// A trial that never settled
    pub fn failed(start: usize) -> Self {
        Self {
            success: false,
            start,
            length: 0,
            error_sum: f64::INFINITY,
        }
    }

    /// A trial that settled after `length` samples
    pub fn settled(start: usize, length: usize, error_sum: f64) -> Self {
        Self {
            success: true,
            start,
            length,
            error_sum,
        }
    }

    /// Dominance rule between two trials
    ///
    /// A success beats a failure; between successes the shorter run wins,
    /// unless the other's error sum is a hundred times larger. A failure
    /// never beats anything. The rule is not transitive and two successes
    /// can each beat the other.
    pub fn better_than(&self, other: &TrialResult) -> bool {
        if !self.success {
            return false;
        }
        !other.success
            || self.length < other.length
            || self.error_sum / other.error_sum < DOMINANCE_RATIO
    }
}

/// Fitted boundaries of a repaired run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickFit {
    pub start: usize,
    pub length: usize,
    /// Detection ratio at the suspicious sample before the search
    pub error_level: f64,
}

/// Result of a length search
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    /// The channel is repaired over the fitted run
    Found(ClickFit),
    /// No candidate settled; the channel is unchanged
    Exhausted { candidates: usize },
}

// ============================================================================
// Finder
// ============================================================================

/// Boundary search over one channel span
#[derive(Debug, Clone)]
pub struct ClickLengthFinder {
    repairer: ClickRepairer,
    detector: ClickDetector,
    history_length: usize,
}

impl ClickLengthFinder {
    pub fn new(settings: &ProcessingSettings) -> Self {
        Self {
            repairer: ClickRepairer::new(settings),
            detector: ClickDetector::new(settings),
            history_length: settings.history_length(),
        }
    }

    /// Detector sharing this finder's settings
    pub fn detector(&self) -> &ClickDetector {
        &self.detector
    }

    /// Recompute the error at `position` from the output and re-test it
    ///
    /// Errors past a nearby repair's trailing window still describe the
    /// damaged audio; this brings one of them up to date before acting on it.
    pub fn revalidate(&mut self, span: &mut ChannelSpan<'_>, position: usize) -> Result<bool> {
        self.repairer.recompute_errors(span, position, position + 1)?;
        Ok(self.detector.is_suspicious(span, position))
    }

    /// Fit and repair the run around `init_position`
    ///
    /// # Arguments
    /// * `span` - Window owning the whole search neighbourhood
    /// * `init_position` - First suspicious sample
    /// * `max_length` - Longest run a trial may grow to
    /// * `boundary` - Earliest start the search may consider
    ///
    /// # Returns
    /// The fitted run, with the channel repaired over it, or the number of
    /// candidates that failed with the channel left as it was.
    pub fn find(
        &mut self,
        span: &mut ChannelSpan<'_>,
        init_position: usize,
        max_length: usize,
        boundary: usize,
    ) -> Result<SearchOutcome> {
        let error_level = self.detector.ratio(span, init_position);
        let lowest = init_position.saturating_sub(SEARCH_BACKTRACK).max(boundary);

        let mut best = TrialResult::failed(init_position);
        let mut candidates = 0;
        for candidate in (lowest..=init_position).rev() {
            candidates += 1;

            let reach = init_position.max(candidate + max_length);
            let window = candidate.saturating_sub(self.history_length + BLOCK_SIZE)
                ..reach + self.history_length + BLOCK_SIZE + TRAILING_SAMPLES + 1;
            let snapshot = span.snapshot(window);
            let result = self.trial(span, candidate, init_position, max_length);
            span.restore(&snapshot);

            let result = result?;
            trace!(
                candidate,
                success = result.success,
                length = result.length,
                error_sum = result.error_sum,
                "length trial"
            );
            if result.better_than(&best) {
                best = result;
            }
        }

        if !best.success {
            return Ok(SearchOutcome::Exhausted { candidates });
        }

        self.repairer.repair(span, best.start, best.length)?;
        Ok(SearchOutcome::Found(ClickFit {
            start: best.start,
            length: best.length,
            error_level,
        }))
    }

    /// Repair from `candidate` up to the suspicious sample, then grow one
    /// sample at a time until the boundary settles
    fn trial(
        &mut self,
        span: &mut ChannelSpan<'_>,
        candidate: usize,
        init_position: usize,
        max_length: usize,
    ) -> Result<TrialResult> {
        let mut length = init_position - candidate;
        self.repairer.repair(span, candidate, length)?;

        loop {
            if length >= max_length {
                return Ok(TrialResult::failed(candidate));
            }
            let end = candidate + length;
            if end + TRAILING_SAMPLES > span.end() {
                return Ok(TrialResult::failed(candidate));
            }

            self.repairer.repair(span, end, 1)?;
            length += 1;

            let edge = end + 1;
            if (edge..edge + BOUNDARY_CHECK).any(|q| self.detector.is_suspicious(span, q)) {
                continue;
            }

            let error_sum: f64 = (edge..edge + SETTLE_SAMPLES)
                .map(|q| span.error(q).abs() as f64)
                .sum();
            if error_sum < SETTLE_LIMIT {
                return Ok(TrialResult::settled(candidate, length, error_sum));
            }
        }
    }
}
