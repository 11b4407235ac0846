//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::SettingsArgs;
use crate::engine::{export_wav, import_wav, AudioSignal, ChannelTag, Click, ClickScanner};
use crate::error::Result;
use crate::settings::ProcessingSettings;

/// Clicks found in one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel: ChannelTag,
    pub clicks: Vec<Click>,
}

/// JSON report written by `scan` and `repair`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub file: String,
    pub generated_at: DateTime<Utc>,
    pub sample_rate: u32,
    pub sample_count: usize,
    pub settings: ProcessingSettings,
    pub channels: Vec<ChannelReport>,
}

impl ScanReport {
    /// Collect the registries of every channel of `signal`
    pub fn from_signal(file: &Path, signal: &AudioSignal) -> Result<Self> {
        let channels = signal
            .channel_tags()
            .iter()
            .map(|&tag| -> Result<ChannelReport> {
                Ok(ChannelReport {
                    channel: tag,
                    clicks: signal.channel(tag)?.clicks().to_vec(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            file: file.display().to_string(),
            generated_at: Utc::now(),
            sample_rate: signal.sample_rate(),
            sample_count: signal.sample_count(),
            settings: *signal.settings(),
            channels,
        })
    }

    /// Total clicks across channels
    pub fn click_count(&self) -> usize {
        self.channels.iter().map(|c| c.clicks.len()).sum()
    }

    /// Write the report as pretty-printed JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Resolve settings from an optional JSON file and flag overrides
pub fn build_settings(args: &SettingsArgs) -> Result<ProcessingSettings> {
    let base = match &args.settings {
        Some(path) => ProcessingSettings::from_json_file(path)?,
        None => ProcessingSettings::default(),
    };

    let mut settings = if args.history.is_some() || args.order.is_some() {
        let mut reshaped = ProcessingSettings::new(
            args.history.unwrap_or(base.history_length()),
            args.order.unwrap_or(base.coefficients_number()),
        )?;
        reshaped.set_detection_threshold(base.detection_threshold())?;
        reshaped.set_max_correction_length(base.max_correction_length())?;
        reshaped
    } else {
        base
    };

    if let Some(threshold) = args.threshold {
        settings.set_detection_threshold(threshold)?;
    }
    if let Some(max_length) = args.max_length {
        settings.set_max_correction_length(max_length)?;
    }
    Ok(settings)
}

fn scanner(args: &SettingsArgs) -> ClickScanner {
    match args.jobs {
        Some(jobs) => ClickScanner::with_workers(jobs),
        None => ClickScanner::new(),
    }
}

/// Import, scan every channel, and build the report
fn scan_file(input: &Path, args: &SettingsArgs) -> Result<(AudioSignal, ScanReport)> {
    let settings = build_settings(args)?;
    let mut signal = import_wav(input, settings)?;
    info!(
        "Scanning {} ({} samples at {} Hz)",
        input.display(),
        signal.sample_count(),
        signal.sample_rate()
    );

    let summaries = signal.scan_all(&scanner(args), None)?;
    for summary in &summaries {
        println!(
            "{:>6}: {} clicks ({} segments, {:.2?})",
            summary.channel.to_string(),
            summary.clicks,
            summary.segments,
            summary.elapsed
        );
    }

    let report = ScanReport::from_signal(input, &signal)?;
    Ok((signal, report))
}

/// Detect clicks and optionally write a report.
pub fn scan(input: &Path, report_path: Option<&Path>, args: &SettingsArgs) -> Result<ScanReport> {
    let (_, report) = scan_file(input, args)?;

    println!("Found {} clicks in {}", report.click_count(), input.display());
    if let Some(path) = report_path {
        report.write(path)?;
        println!("Report written: {}", path.display());
    }

    Ok(report)
}

/// Detect and repair clicks, then write the repaired audio.
pub fn repair(
    input: &Path,
    output: &Path,
    report_path: Option<&Path>,
    bit_depth: u16,
    args: &SettingsArgs,
) -> Result<ScanReport> {
    let (signal, report) = scan_file(input, args)?;

    export_wav(&signal, output, bit_depth)?;
    println!(
        "Repaired {} clicks: {} -> {}",
        report.click_count(),
        input.display(),
        output.display()
    );
    if let Some(path) = report_path {
        report.write(path)?;
        println!("Report written: {}", path.display());
    }

    Ok(report)
}
