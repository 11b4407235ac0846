//! Audio Signal
//!
//! A mono or stereo set of channels plus the settings they are processed
//! with. Channels are always selected explicitly with a [`ChannelTag`];
//! there is no "current channel" state.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::channel::Channel;
use crate::engine::click::Click;
use crate::engine::scan::{ClickScanner, ProgressCallback, ScanSummary};
use crate::error::{DeclickError, Result};
use crate::settings::ProcessingSettings;

// ============================================================================
// Identifiers
// ============================================================================

/// Identity of an [`AudioSignal`], carried by every click found in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(Uuid);

impl SignalId {
    /// Fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Channel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelTag {
    /// The only channel of a mono signal
    Mono,
    /// First channel of a stereo signal
    Left,
    /// Second channel of a stereo signal
    Right,
}

impl fmt::Display for ChannelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelTag::Mono => "mono",
            ChannelTag::Left => "left",
            ChannelTag::Right => "right",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Channel layout
// ============================================================================

/// Mono or stereo channel storage
#[derive(Debug, Clone)]
pub enum Channels {
    /// Single channel
    Mono(Channel),
    /// Left and right channels of equal length
    Stereo(Channel, Channel),
}

impl Channels {
    /// Layout name used in messages
    pub fn layout_name(&self) -> &'static str {
        match self {
            Channels::Mono(_) => "mono",
            Channels::Stereo(..) => "stereo",
        }
    }

    /// Tags valid for this layout, in file order
    pub fn tags(&self) -> &'static [ChannelTag] {
        match self {
            Channels::Mono(_) => &[ChannelTag::Mono],
            Channels::Stereo(..) => &[ChannelTag::Left, ChannelTag::Right],
        }
    }
}

// ============================================================================
// Audio Signal
// ============================================================================

/// Audio under repair
#[derive(Debug, Clone)]
pub struct AudioSignal {
    id: SignalId,
    channels: Channels,
    settings: ProcessingSettings,
    sample_rate: u32,
}

impl AudioSignal {
    /// Create a mono signal
    pub fn mono(samples: Vec<f32>, sample_rate: u32, settings: ProcessingSettings) -> Result<Self> {
        Ok(Self {
            id: SignalId::new(),
            channels: Channels::Mono(Channel::new(samples)?),
            settings,
            sample_rate,
        })
    }

    /// Create a stereo signal; both channels must have the same length
    pub fn stereo(
        left: Vec<f32>,
        right: Vec<f32>,
        sample_rate: u32,
        settings: ProcessingSettings,
    ) -> Result<Self> {
        if left.len() != right.len() {
            return Err(DeclickError::UnsupportedFormat {
                format: format!(
                    "stereo channels of different lengths ({} and {})",
                    left.len(),
                    right.len()
                ),
            });
        }
        Ok(Self {
            id: SignalId::new(),
            channels: Channels::Stereo(Channel::new(left)?, Channel::new(right)?),
            settings,
            sample_rate,
        })
    }

    /// Identity carried by this signal's clicks
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per channel
    pub fn sample_count(&self) -> usize {
        match &self.channels {
            Channels::Mono(channel) | Channels::Stereo(channel, _) => channel.len(),
        }
    }

    /// Processing settings
    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }

    /// Change the detection threshold for later scans
    ///
    /// The predictor window and order are fixed at construction; only the
    /// thresholds can change between scans.
    pub fn set_detection_threshold(&mut self, threshold: f32) -> Result<()> {
        self.settings.set_detection_threshold(threshold)
    }

    /// Change the longest run later scans will repair
    pub fn set_max_correction_length(&mut self, length: usize) -> Result<()> {
        self.settings.set_max_correction_length(length)
    }

    /// Channel storage
    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Tags valid for this signal
    pub fn channel_tags(&self) -> &'static [ChannelTag] {
        self.channels.tags()
    }

    /// Select a channel
    pub fn channel(&self, tag: ChannelTag) -> Result<&Channel> {
        match (&self.channels, tag) {
            (Channels::Mono(channel), ChannelTag::Mono) => Ok(channel),
            (Channels::Stereo(left, _), ChannelTag::Left) => Ok(left),
            (Channels::Stereo(_, right), ChannelTag::Right) => Ok(right),
            (channels, channel) => Err(DeclickError::ChannelNotFound {
                channel,
                layout: channels.layout_name(),
            }),
        }
    }

    /// Select a channel mutably
    pub fn channel_mut(&mut self, tag: ChannelTag) -> Result<&mut Channel> {
        let layout = self.channels.layout_name();
        match (&mut self.channels, tag) {
            (Channels::Mono(channel), ChannelTag::Mono) => Ok(channel),
            (Channels::Stereo(left, _), ChannelTag::Left) => Ok(left),
            (Channels::Stereo(_, right), ChannelTag::Right) => Ok(right),
            (_, channel) => Err(DeclickError::ChannelNotFound { channel, layout }),
        }
    }

    /// Register a click produced elsewhere
    ///
    /// The click must carry this signal's id and a valid channel tag.
    pub fn add_click(&mut self, click: Click) -> Result<()> {
        if click.signal() != self.id {
            return Err(DeclickError::ForeignClick);
        }
        self.channel_mut(click.channel())?.add_click(click);
        Ok(())
    }

    /// Compute prediction errors for a channel
    ///
    /// Scanning does this on demand; calling it ahead of time only moves the
    /// cost.
    pub fn preprocess(&mut self, tag: ChannelTag, scanner: &ClickScanner) -> Result<()> {
        let settings = self.settings;
        let channel = self.channel_mut(tag)?;
        scanner.preprocess(channel, &settings, None)
    }

    /// Detect and repair clicks in one channel
    ///
    /// Clears the channel's registry first; the output restarts from the
    /// original input.
    pub fn scan(
        &mut self,
        tag: ChannelTag,
        scanner: &ClickScanner,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<ScanSummary> {
        let settings = self.settings;
        let id = self.id;
        let channel = self.channel_mut(tag)?;
        scanner.scan(channel, &settings, tag, id, progress)
    }

    /// Detect and repair clicks in every channel
    pub fn scan_all(
        &mut self,
        scanner: &ClickScanner,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<ScanSummary>> {
        self.channel_tags()
            .iter()
            .map(|&tag| self.scan(tag, scanner, progress))
            .collect()
    }

    /// Total clicks across channels
    pub fn click_count(&self) -> usize {
        self.channel_tags()
            .iter()
            .filter_map(|&tag| self.channel(tag).ok())
            .map(Channel::click_count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_channel_selection() {
        let signal = AudioSignal::mono(vec![0.0; 16], 44100, ProcessingSettings::default()).unwrap();

        assert!(signal.channel(ChannelTag::Mono).is_ok());
        let err = signal.channel(ChannelTag::Left).unwrap_err();
        assert_eq!(err.error_code(), "CHANNEL_NOT_FOUND");
        assert_eq!(signal.channel_tags(), &[ChannelTag::Mono]);
        assert_eq!(signal.sample_count(), 16);
    }

    #[test]
    fn test_stereo_channel_selection() {
        let mut signal = AudioSignal::stereo(
            vec![0.1; 8],
            vec![0.2; 8],
            48000,
            ProcessingSettings::default(),
        )
        .unwrap();

        assert_eq!(signal.channel(ChannelTag::Left).unwrap().input(0), Some(0.1));
        assert_eq!(signal.channel(ChannelTag::Right).unwrap().input(0), Some(0.2));
        assert!(signal.channel_mut(ChannelTag::Mono).is_err());
    }

    #[test]
    fn test_stereo_length_mismatch() {
        let result = AudioSignal::stereo(vec![0.0; 8], vec![0.0; 9], 48000, ProcessingSettings::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_add_click_checks_identity() {
        let mut signal = AudioSignal::mono(vec![0.0; 16], 44100, ProcessingSettings::default()).unwrap();

        let own = Click::new(3, 2, 20.0, ChannelTag::Mono, signal.id());
        signal.add_click(own).unwrap();
        assert_eq!(signal.click_count(), 1);

        let foreign = Click::new(3, 2, 20.0, ChannelTag::Mono, SignalId::new());
        assert!(matches!(signal.add_click(foreign), Err(DeclickError::ForeignClick)));

        let wrong_channel = Click::new(3, 2, 20.0, ChannelTag::Right, signal.id());
        assert!(signal.add_click(wrong_channel).is_err());
    }

    #[test]
    fn test_thresholds_are_mutable_between_scans() {
        let mut signal = AudioSignal::mono(vec![0.0; 16], 44100, ProcessingSettings::default()).unwrap();
        signal.set_detection_threshold(3.0).unwrap();
        signal.set_max_correction_length(40).unwrap();

        assert_eq!(signal.settings().detection_threshold(), 3.0);
        assert_eq!(signal.settings().max_correction_length(), 40);
        assert_eq!(signal.settings().history_length(), 512);
        assert_eq!(signal.settings().coefficients_number(), 4);

        assert!(signal.set_detection_threshold(-1.0).is_err());
        assert_eq!(signal.settings().detection_threshold(), 3.0);
    }
}
