//! Scan Orchestrator
//!
//! Drives a channel through preprocessing and a full detect-and-repair scan.
//!
//! Preprocessing computes one prediction error per sample in parallel; the
//! result is kept as a backup so later scans with a different threshold skip
//! it. Scanning cuts the channel into contiguous segments, one per worker.
//! Each worker owns an exclusive [`ChannelSpan`] and only scans the inner
//! part of it, a margin away from both cut points, so every repair it makes
//! (and every baseline it reads) stays inside its own span. The margins
//! around interior cuts ("seams") are scanned afterwards on one thread, so
//! each position of `[history_length, N)` is scanned exactly once.

use std::fmt;
use std::ops::Range;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::dsp::{
    align_down, estimate_max_length, BurgPredictor, ClickLengthFinder, ErrorAverageTracker,
    SearchOutcome, BLOCK_SIZE,
};
use crate::engine::channel::{Channel, ChannelSpan};
use crate::engine::click::Click;
use crate::engine::signal::{ChannelTag, SignalId};
use crate::error::{DeclickError, Result};
use crate::settings::ProcessingSettings;

// ============================================================================
// Progress
// ============================================================================

/// Where a channel stands in the preprocess/scan cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanPhase {
    NotPreprocessed,
    Preprocessing,
    Preprocessed,
    Scanning,
    Merged,
    Idle,
}

impl ScanPhase {
    /// Resting phase of a channel between operations
    pub fn of(channel: &Channel) -> Self {
        if channel.is_preprocessed() {
            ScanPhase::Preprocessed
        } else {
            ScanPhase::NotPreprocessed
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanPhase::NotPreprocessed => "not preprocessed",
            ScanPhase::Preprocessing => "preprocessing",
            ScanPhase::Preprocessed => "preprocessed",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Merged => "merged",
            ScanPhase::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// Progress notification
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    /// Completed fraction of the phase, 0.0 to 1.0
    pub fraction: f32,
}

/// Progress observer; called from worker threads
pub type ProgressCallback<'a> = &'a (dyn Fn(ScanProgress) + Sync);

fn report(progress: Option<ProgressCallback<'_>>, phase: ScanPhase, fraction: f32) {
    if let Some(callback) = progress {
        callback(ScanProgress { phase, fraction });
    }
}

/// Result of scanning one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanSummary {
    pub channel: ChannelTag,
    /// Clicks registered by the scan
    pub clicks: usize,
    /// Segments scanned in parallel
    pub segments: usize,
    pub elapsed: Duration,
}

// ============================================================================
// Plan and partition
// ============================================================================

/// Distance kept between a segment's scanned range and its cut points
///
/// Covers a full-length repair plus the two history lengths the baseline
/// refresh reads back, rounded up to whole blocks.
pub fn scan_margin(settings: &ProcessingSettings) -> usize {
    let raw = 2 * settings.history_length() + settings.max_correction_length() + 2 * BLOCK_SIZE;
    align_down(raw + BLOCK_SIZE - 1)
}

/// One worker's share of a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Positions the worker may write
    pub owned: Range<usize>,
    /// Positions the worker scans
    pub scan: Range<usize>,
}

/// Segments plus the seams between them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    bounds: Vec<usize>,
    segments: Vec<Segment>,
    seams: Vec<Range<usize>>,
}

impl Partition {
    /// Cut points between segments
    pub fn interior_bounds(&self) -> &[usize] {
        &self.bounds[1..self.bounds.len() - 1]
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Ranges around the interior cut points left for the sequential pass
    pub fn seams(&self) -> &[Range<usize>] {
        &self.seams
    }
}

/// Settings and margin frozen at scan start
///
/// Later edits to the caller's settings cannot move segment boundaries of a
/// scan already planned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPlan {
    settings: ProcessingSettings,
    margin: usize,
    workers: usize,
}

impl ScanPlan {
    pub fn new(settings: &ProcessingSettings, workers: usize) -> Self {
        Self {
            settings: *settings,
            margin: scan_margin(settings),
            workers: workers.max(1),
        }
    }

    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }

    pub fn margin(&self) -> usize {
        self.margin
    }

    /// Requested worker count
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Cut a channel of `len` samples into segments
    ///
    /// Fewer segments than workers are produced when the channel is too
    /// short for every segment to hold two margins and a history length.
    pub fn partition(&self, len: usize) -> Partition {
        let history = self.settings.history_length();
        let margin = self.margin;
        let max_workers = (len / (2 * margin + history)).max(1);
        let workers = self.workers.clamp(1, max_workers);

        let mut bounds: Vec<usize> = (0..workers).map(|i| align_down(i * len / workers)).collect();
        bounds.push(len);

        let segments = bounds
            .windows(2)
            .enumerate()
            .map(|(i, cut)| {
                let scan_start = if i == 0 { history } else { cut[0] + margin };
                let scan_end = if i + 1 == workers { len } else { cut[1] - margin };
                Segment {
                    owned: cut[0]..cut[1],
                    scan: scan_start..scan_end,
                }
            })
            .collect();
        let seams = bounds[1..workers]
            .iter()
            .map(|&cut| cut - margin..cut + margin)
            .collect();

        Partition {
            bounds,
            segments,
            seams,
        }
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// Parallel preprocess and scan driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickScanner {
    workers: usize,
}

impl Default for ClickScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ClickScanner {
    /// One worker per rayon thread
    pub fn new() -> Self {
        Self::with_workers(rayon::current_num_threads())
    }

    /// A fixed number of segments per scan
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Compute and back up the prediction error of every sample
    ///
    /// Settings are validated first; on failure the channel is untouched.
    pub fn preprocess(
        &self,
        channel: &mut Channel,
        settings: &ProcessingSettings,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<()> {
        settings.validate_for(channel.len())?;
        report(progress, ScanPhase::Preprocessing, 0.0);

        let started = Instant::now();
        let history = settings.history_length();
        let order = settings.coefficients_number();
        let (input, errors) = channel.input_and_errors_mut();

        errors[..history].fill(0.0);
        errors[history..]
            .par_iter_mut()
            .enumerate()
            .try_for_each_init(
                || BurgPredictor::new(order, history),
                |predictor, (i, error)| {
                    let p = history + i;
                    let prediction = predictor
                        .predict(&input[p - history..p])
                        .ok_or(DeclickError::NumericalFailure { position: p })?;
                    *error = (input[p] as f64 - prediction.forward) as f32;
                    Ok::<(), DeclickError>(())
                },
            )?;

        channel.finish_preprocessing(settings);
        debug!(
            samples = channel.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prediction errors computed"
        );
        report(progress, ScanPhase::Preprocessed, 1.0);
        Ok(())
    }

    /// Detect and repair every click in a channel
    ///
    /// The registry is cleared and the output reset to the input before the
    /// scan; errors come from the preprocessing backup, computing it first
    /// if it is missing or was made with another window or order. Only the first segment reports `Scanning` progress.
    pub fn scan(
        &self,
        channel: &mut Channel,
        settings: &ProcessingSettings,
        tag: ChannelTag,
        signal: SignalId,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<ScanSummary> {
        let started = Instant::now();
        let plan = ScanPlan::new(settings, self.workers);
        let settings = *plan.settings();
        settings.validate_for(channel.len())?;

        if !channel.is_preprocessed_for(&settings) {
            self.preprocess(channel, &settings, progress)?;
        }
        channel.reset_for_scan();
        {
            let mut span = channel.span_mut();
            let len = span.end();
            ErrorAverageTracker::new(settings.history_length()).refresh(&mut span, 0..len);
        }

        let partition = plan.partition(channel.len());
        debug!(
            channel = %tag,
            segments = partition.segments().len(),
            margin = plan.margin(),
            "scan planned"
        );
        report(progress, ScanPhase::Scanning, 0.0);

        let per_segment: Vec<Vec<Click>> = channel
            .split_spans(partition.interior_bounds())
            .into_par_iter()
            .zip(partition.segments().par_iter())
            .enumerate()
            .map(|(index, (mut span, segment))| {
                let progress = if index == 0 { progress } else { None };
                SegmentScanner::new(&settings, tag, signal).scan(&mut span, segment.scan.clone(), progress)
            })
            .collect::<Result<_>>()?;

        let mut clicks: Vec<Click> = per_segment.into_iter().flatten().collect();
        clicks.sort_by_key(Click::start_position);

        if !partition.seams().is_empty() {
            let mut seam_scanner = SegmentScanner::new(&settings, tag, signal);
            let mut span = channel.span_mut();
            for seam in partition.seams() {
                let resume = clicks
                    .iter()
                    .filter(|click| click.start_position() < seam.start)
                    .map(Click::end_position)
                    .fold(seam.start, usize::max);
                if resume < seam.end {
                    let found = seam_scanner.scan(&mut span, resume..seam.end, None)?;
                    clicks.extend(found);
                }
            }
        }

        clicks.sort_by_key(Click::start_position);
        let count = clicks.len();
        for click in clicks {
            channel.add_click(click);
        }
        report(progress, ScanPhase::Merged, 1.0);

        let summary = ScanSummary {
            channel: tag,
            clicks: count,
            segments: partition.segments().len(),
            elapsed: started.elapsed(),
        };
        info!(
            channel = %tag,
            clicks = summary.clicks,
            segments = summary.segments,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "scan complete"
        );
        report(progress, ScanPhase::Idle, 1.0);
        Ok(summary)
    }
}

// ============================================================================
// Per-segment loop
// ============================================================================

/// Scan loop over one range of one span
struct SegmentScanner {
    finder: ClickLengthFinder,
    max_correction_length: usize,
    channel: ChannelTag,
    signal: SignalId,
}

impl SegmentScanner {
    fn new(settings: &ProcessingSettings, channel: ChannelTag, signal: SignalId) -> Self {
        Self {
            finder: ClickLengthFinder::new(settings),
            max_correction_length: settings.max_correction_length(),
            channel,
            signal,
        }
    }

    fn scan(
        &mut self,
        span: &mut ChannelSpan<'_>,
        range: Range<usize>,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<Click>> {
        let mut clicks: Vec<Click> = Vec::new();
        let mut last_processed = range.start;
        let step = (range.len() / 100).max(1);
        let mut next_report = range.start;

        let mut p = range.start;
        while p < range.end {
            if p >= next_report {
                let fraction = (p - range.start) as f32 / range.len() as f32;
                report(progress, ScanPhase::Scanning, fraction);
                next_report = p + step;
            }

            if let Some(last) = clicks.last().filter(|click| click.contains(p)) {
                p = last.end_position();
                continue;
            }

            if self.finder.detector().is_suspicious(span, p) && self.finder.revalidate(span, p)? {
                let max_length = estimate_max_length(span, p, self.max_correction_length);
                match self.finder.find(span, p, max_length, last_processed)? {
                    SearchOutcome::Found(fit) => {
                        let click = Click::new(fit.start, fit.length, fit.error_level, self.channel, self.signal);
                        debug!(
                            channel = %self.channel,
                            start = fit.start,
                            length = fit.length,
                            ratio = fit.error_level,
                            "click repaired"
                        );
                        last_processed = click.end_position();
                        p = last_processed;
                        clicks.push(click);
                        continue;
                    }
                    SearchOutcome::Exhausted { candidates } => {
                        trace!(position = p, candidates, max_length, "no fit");
                    }
                }
            }
            p += 1;
        }

        Ok(clicks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use test_case::test_case;

    fn small_settings() -> ProcessingSettings {
        let mut settings = ProcessingSettings::new(64, 4).unwrap();
        settings.set_max_correction_length(40).unwrap();
        settings
    }

    #[test]
    fn test_margin_is_block_aligned() {
        let settings = ProcessingSettings::default();
        // 2 * 512 + 250 + 32 = 1306, rounded up to 1312
        assert_eq!(scan_margin(&settings), 1312);
        assert_eq!(scan_margin(&small_settings()) % BLOCK_SIZE, 0);
    }

    #[test]
    fn test_plan_freezes_settings() {
        let mut settings = small_settings();
        let plan = ScanPlan::new(&settings, 4);
        let margin = plan.margin();

        settings.set_max_correction_length(4000).unwrap();
        assert_eq!(plan.margin(), margin);
        assert_eq!(plan.settings().max_correction_length(), 40);
    }

    #[test_case(20_000, 1)]
    #[test_case(20_000, 3)]
    #[test_case(20_000, 8)]
    #[test_case(123_457, 7)]
    #[test_case(1_000, 16)]
    fn test_partition_covers_scan_range_once(len: usize, workers: usize) {
        let settings = small_settings();
        let plan = ScanPlan::new(&settings, workers);
        let partition = plan.partition(len);

        // Scanned ranges and seams in order tile [history, len)
        let mut pieces: Vec<Range<usize>> = Vec::new();
        for (i, segment) in partition.segments().iter().enumerate() {
            pieces.push(segment.scan.clone());
            if let Some(seam) = partition.seams().get(i) {
                pieces.push(seam.clone());
            }
        }
        let mut expected_start = settings.history_length();
        for piece in &pieces {
            assert_eq!(piece.start, expected_start);
            assert!(piece.end > piece.start);
            expected_start = piece.end;
        }
        assert_eq!(expected_start, len);

        // Owned ranges tile [0, len) and keep a margin around each scan
        let mut owned_start = 0;
        for segment in partition.segments() {
            assert_eq!(segment.owned.start, owned_start);
            owned_start = segment.owned.end;
        }
        assert_eq!(owned_start, len);
        for (i, segment) in partition.segments().iter().enumerate().skip(1) {
            assert!(segment.scan.start >= segment.owned.start + plan.margin());
            assert!(partition.segments()[i - 1].scan.end + plan.margin() <= segment.owned.start);
        }
    }

    #[test]
    fn test_short_channel_gets_one_segment() {
        let plan = ScanPlan::new(&small_settings(), 8);
        let partition = plan.partition(600);

        assert_eq!(partition.segments().len(), 1);
        assert!(partition.seams().is_empty());
        assert!(partition.interior_bounds().is_empty());
    }

    #[test]
    fn test_invalid_settings_leave_no_state() {
        let mut channel = Channel::new(vec![0.1; 100]).unwrap();
        let scanner = ClickScanner::with_workers(2);
        let result = scanner.scan(
            &mut channel,
            &ProcessingSettings::default(),
            ChannelTag::Mono,
            SignalId::new(),
            None,
        );

        assert!(matches!(result, Err(DeclickError::SignalTooShort { samples: 100, required: 1024 })));
        assert!(!channel.is_preprocessed());
        assert_eq!(ScanPhase::of(&channel), ScanPhase::NotPreprocessed);
        assert!(channel.prediction_errors().iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_preprocess_constant_signal() {
        let mut channel = Channel::new(vec![0.5; 2048]).unwrap();
        let scanner = ClickScanner::with_workers(2);
        scanner
            .preprocess(&mut channel, &ProcessingSettings::default(), None)
            .unwrap();

        assert!(channel.is_preprocessed());
        assert!(channel.prediction_errors().iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_rescan_with_new_window_preprocesses_again() {
        let mut samples: Vec<f32> = (0..8192)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * i as f32 / 37.0).sin())
            .collect();
        samples[3000] += 0.4;
        let narrow = ProcessingSettings::new(64, 2).unwrap();
        let scanner = ClickScanner::with_workers(1);
        let id = SignalId::new();

        let mut rescanned = Channel::new(samples.clone()).unwrap();
        scanner
            .scan(&mut rescanned, &ProcessingSettings::default(), ChannelTag::Mono, id, None)
            .unwrap();
        scanner
            .scan(&mut rescanned, &narrow, ChannelTag::Mono, id, None)
            .unwrap();

        let mut fresh = Channel::new(samples).unwrap();
        scanner
            .scan(&mut fresh, &narrow, ChannelTag::Mono, id, None)
            .unwrap();

        assert!(rescanned.is_preprocessed_for(&narrow));
        assert_eq!(rescanned.clicks(), fresh.clicks());
        assert_eq!(rescanned.prediction_errors(), fresh.prediction_errors());
        assert_eq!(rescanned.output_samples(), fresh.output_samples());
    }

    #[test]
    fn test_single_click_and_phases() {
        let mut samples = vec![0.5f32; 5 * 512];
        samples[1283..1293].fill(0.0);
        let mut channel = Channel::new(samples).unwrap();

        let phases = Mutex::new(Vec::new());
        let callback = |progress: ScanProgress| {
            let mut phases = phases.lock().unwrap();
            if phases.last() != Some(&progress.phase) {
                phases.push(progress.phase);
            }
        };

        let summary = ClickScanner::with_workers(1)
            .scan(
                &mut channel,
                &ProcessingSettings::default(),
                ChannelTag::Mono,
                SignalId::new(),
                Some(&callback),
            )
            .unwrap();

        assert_eq!(summary.clicks, 1);
        assert_eq!(summary.segments, 1);
        let click = channel.click(0).unwrap();
        assert_eq!((click.start_position(), click.length()), (1283, 10));
        assert!(channel.output_samples().iter().all(|&s| s == 0.5));

        assert_eq!(
            phases.into_inner().unwrap(),
            vec![
                ScanPhase::Preprocessing,
                ScanPhase::Preprocessed,
                ScanPhase::Scanning,
                ScanPhase::Merged,
                ScanPhase::Idle,
            ]
        );
    }
}
