//! Click Registry Entries
//!
//! A [`Click`] is one confirmed damaged run. It refers back to its signal
//! through a [`SignalId`] and a [`ChannelTag`] rather than a reference, so
//! clicks can be copied out, serialized and handed back for resizing.
//!
//! Resizing goes through the owning [`AudioSignal`]: the old range is put
//! back to the original input, the new range is repaired, and the refreshed
//! detection ratio is returned to the caller.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsp::{ClickRepairer, ErrorAverageTracker, TRAILING_SAMPLES};
use crate::engine::channel::Channel;
use crate::engine::scan::ClickScanner;
use crate::engine::signal::{AudioSignal, ChannelTag, SignalId};
use crate::error::{DeclickError, Result};
use crate::settings::ProcessingSettings;

/// A confirmed damaged run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Click {
    start_position: usize,
    length: usize,
    error_level_at_detection: f64,
    approved: bool,
    channel: ChannelTag,
    signal: SignalId,
}

impl Click {
    /// Create an approved click
    pub fn new(
        start_position: usize,
        length: usize,
        error_level: f64,
        channel: ChannelTag,
        signal: SignalId,
    ) -> Self {
        Self {
            start_position,
            length,
            error_level_at_detection: error_level,
            approved: true,
            channel,
            signal,
        }
    }

    /// First damaged sample
    pub fn start_position(&self) -> usize {
        self.start_position
    }

    /// Number of damaged samples
    pub fn length(&self) -> usize {
        self.length
    }

    /// One past the last damaged sample
    pub fn end_position(&self) -> usize {
        self.start_position + self.length
    }

    /// Detection ratio recorded at detection or after the last resize
    pub fn error_level(&self) -> f64 {
        self.error_level_at_detection
    }

    /// Whether the repair is applied to the output
    pub fn is_approved(&self) -> bool {
        self.approved
    }

    /// Channel the click was found in
    pub fn channel(&self) -> ChannelTag {
        self.channel
    }

    /// Signal the click belongs to
    pub fn signal(&self) -> SignalId {
        self.signal
    }

    /// True if `position` lies inside the click
    pub fn contains(&self, position: usize) -> bool {
        (self.start_position..self.end_position()).contains(&position)
    }
}

/// Interactive boundary adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClickResize {
    /// Move the start one sample earlier
    ExpandLeft,
    /// Move the end one sample later
    ExpandRight,
    /// Move the start one sample later
    ShrinkLeft,
    /// Move the end one sample earlier
    ShrinkRight,
}

impl ClickResize {
    /// New `(start, length)` for a click, if the result is non-empty
    fn apply(self, start: usize, length: usize) -> Option<(usize, usize)> {
        match self {
            ClickResize::ExpandLeft => Some((start.checked_sub(1)?, length + 1)),
            ClickResize::ExpandRight => Some((start, length + 1)),
            ClickResize::ShrinkLeft if length > 1 => Some((start + 1, length - 1)),
            ClickResize::ShrinkRight if length > 1 => Some((start, length - 1)),
            _ => None,
        }
    }
}

// ============================================================================
// Click mutation on the owning signal
// ============================================================================

impl AudioSignal {
    /// Move a click's start one sample earlier and repair
    pub fn expand_left(&mut self, channel: ChannelTag, index: usize) -> Result<f64> {
        self.resize_click(channel, index, ClickResize::ExpandLeft)
    }

    /// Move a click's end one sample later and repair
    pub fn expand_right(&mut self, channel: ChannelTag, index: usize) -> Result<f64> {
        self.resize_click(channel, index, ClickResize::ExpandRight)
    }

    /// Move a click's start one sample later and repair
    pub fn shrink_left(&mut self, channel: ChannelTag, index: usize) -> Result<f64> {
        self.resize_click(channel, index, ClickResize::ShrinkLeft)
    }

    /// Move a click's end one sample earlier and repair
    pub fn shrink_right(&mut self, channel: ChannelTag, index: usize) -> Result<f64> {
        self.resize_click(channel, index, ClickResize::ShrinkRight)
    }

    /// Resize a registered click
    ///
    /// Returns the refreshed detection ratio at the new start, which is also
    /// stored as the click's error level. Must not run concurrently with a
    /// scan of the same channel; `&mut self` enforces that.
    pub fn resize_click(
        &mut self,
        channel: ChannelTag,
        index: usize,
        resize: ClickResize,
    ) -> Result<f64> {
        let settings = *self.settings();
        let target = self.editable_channel(channel)?;
        let click = target.click_mut(index).copied()?;

        let (start, length) = resize
            .apply(click.start_position, click.length)
            .ok_or_else(|| DeclickError::InvalidResize {
                reason: format!("{:?} would leave the click empty", resize),
            })?;
        check_bounds(start, length, &settings, target.len())?;

        let limit = next_repair_start(target, index, click.end_position());
        let mut repairer = ClickRepairer::new(&settings);
        let ratio = {
            let mut span = target.span_mut();
            if click.approved {
                repairer.restore(&mut span, click.start_position, click.length, limit);
                repairer.repair(&mut span, start, length)?
            } else {
                repairer.detection_ratio(&span, start)
            }
        };

        let entry = target.click_mut(index)?;
        entry.start_position = start;
        entry.length = length;
        entry.error_level_at_detection = ratio;
        debug!(
            channel = %channel,
            index,
            start,
            length,
            ratio,
            "click resized ({:?})",
            resize
        );
        Ok(ratio)
    }

    /// Flip a click between repaired and original audio
    ///
    /// Returns the refreshed detection ratio at the click start.
    pub fn toggle_approved(&mut self, channel: ChannelTag, index: usize) -> Result<f64> {
        let settings = *self.settings();
        let target = self.editable_channel(channel)?;
        let click = target.click_mut(index).copied()?;
        check_bounds(click.start_position, click.length, &settings, target.len())?;

        let limit = next_repair_start(target, index, click.end_position());
        let mut repairer = ClickRepairer::new(&settings);
        let ratio = {
            let mut span = target.span_mut();
            if click.approved {
                repairer.restore(&mut span, click.start_position, click.length, limit)
            } else {
                repairer.repair(&mut span, click.start_position, click.length)?
            }
        };

        let entry = target.click_mut(index)?;
        entry.approved = !click.approved;
        entry.error_level_at_detection = ratio;
        Ok(ratio)
    }

    /// Channel ready for an edit: preprocessed with the signal's current
    /// window and order, and holding only this signal's clicks
    fn editable_channel(&mut self, channel: ChannelTag) -> Result<&mut Channel> {
        let settings = *self.settings();
        let id = self.id();
        let target = self.channel_mut(channel)?;
        if !target.is_preprocessed() {
            return Err(DeclickError::NotPreprocessed { channel });
        }
        if target
            .clicks()
            .iter()
            .any(|click| click.signal != id || click.channel != channel)
        {
            return Err(DeclickError::ForeignClick);
        }
        if !target.is_preprocessed_for(&settings) {
            reapply_repairs(target, &settings, channel)?;
        }
        Ok(target)
    }
}

/// Reject a range the repairer cannot work on
fn check_bounds(start: usize, length: usize, settings: &ProcessingSettings, len: usize) -> Result<()> {
    let history = settings.history_length();
    if start < history {
        return Err(DeclickError::InvalidResize {
            reason: format!("start {} falls inside the {}-sample lead-in", start, history),
        });
    }
    if start + length + TRAILING_SAMPLES > len {
        return Err(DeclickError::InvalidResize {
            reason: format!("end {} runs past the signal", start + length),
        });
    }
    Ok(())
}

/// Start of the first approved click at or after `end`, other than `index`
fn next_repair_start(channel: &Channel, index: usize, end: usize) -> usize {
    channel
        .clicks()
        .iter()
        .enumerate()
        .filter(|&(i, click)| i != index && click.approved && click.start_position >= end)
        .map(|(_, click)| click.start_position)
        .min()
        .unwrap_or(usize::MAX)
}

/// Recompute errors made with another window or order, then redo every
/// approved repair against them
///
/// Clicks the repairer cannot reach keep their audio and error level.
fn reapply_repairs(channel: &mut Channel, settings: &ProcessingSettings, tag: ChannelTag) -> Result<()> {
    debug!(channel = %tag, "prediction errors are stale, preprocessing again");
    ClickScanner::new().preprocess(channel, settings, None)?;

    let len = channel.len();
    let mut clicks: Vec<(usize, Click)> = channel.clicks().iter().copied().enumerate().collect();
    clicks.sort_by_key(|(_, click)| click.start_position);

    let mut levels = Vec::with_capacity(clicks.len());
    {
        let mut span = channel.span_mut();
        ErrorAverageTracker::new(settings.history_length()).refresh(&mut span, 0..len);

        // Left to right, so each repair predicts from already repaired context
        let mut repairer = ClickRepairer::new(settings);
        for (index, click) in clicks {
            if check_bounds(click.start_position, click.length, settings, len).is_err() {
                continue;
            }
            let level = if click.approved {
                repairer.repair(&mut span, click.start_position, click.length)?
            } else {
                repairer.detection_ratio(&span, click.start_position)
            };
            levels.push((index, level));
        }
    }

    for (index, level) in levels {
        channel.click_mut(index)?.error_level_at_detection = level;
    }
    Ok(())
}
