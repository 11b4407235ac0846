//! Processing Settings
//!
//! Tuning parameters shared by every stage of detection and repair.
//! `history_length` and `coefficients_number` shape the predictor and are
//! fixed once a settings value is built; the detection threshold and the
//! maximum correction length may be changed between scans.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::BLOCK_SIZE;
use crate::error::{DeclickError, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Default predictor history window in samples
pub const DEFAULT_HISTORY_LENGTH: usize = 512;

/// Default predictor order
pub const DEFAULT_COEFFICIENTS_NUMBER: usize = 4;

/// Default detection ratio threshold
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 10.0;

/// Default upper bound on a repaired run, in samples
pub const DEFAULT_MAX_CORRECTION_LENGTH: usize = 250;

// ============================================================================
// Processing Settings
// ============================================================================

/// Detection and repair parameters
///
/// # Example
/// ```
/// use declick::ProcessingSettings;
///
/// let mut settings = ProcessingSettings::default();
/// settings.set_detection_threshold(6.0).unwrap();
/// assert_eq!(settings.history_length(), 512);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    history_length: usize,
    coefficients_number: usize,
    detection_threshold: f32,
    max_correction_length: usize,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            history_length: DEFAULT_HISTORY_LENGTH,
            coefficients_number: DEFAULT_COEFFICIENTS_NUMBER,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            max_correction_length: DEFAULT_MAX_CORRECTION_LENGTH,
        }
    }
}

impl ProcessingSettings {
    /// Create settings with a custom predictor shape and default thresholds
    ///
    /// # Arguments
    /// * `history_length` - Predictor window, a positive multiple of 16
    /// * `coefficients_number` - Predictor order, at least 1 and below the window
    pub fn new(history_length: usize, coefficients_number: usize) -> Result<Self> {
        let settings = Self {
            history_length,
            coefficients_number,
            ..Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    ///
    /// Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Predictor history window in samples
    pub fn history_length(&self) -> usize {
        self.history_length
    }

    /// Predictor order
    pub fn coefficients_number(&self) -> usize {
        self.coefficients_number
    }

    /// Detection ratio above which a sample is suspicious
    pub fn detection_threshold(&self) -> f32 {
        self.detection_threshold
    }

    /// Longest run the repairer will attempt
    pub fn max_correction_length(&self) -> usize {
        self.max_correction_length
    }

    /// Set the detection threshold
    pub fn set_detection_threshold(&mut self, threshold: f32) -> Result<()> {
        check_threshold(threshold)?;
        self.detection_threshold = threshold;
        Ok(())
    }

    /// Set the maximum correction length
    pub fn set_max_correction_length(&mut self, length: usize) -> Result<()> {
        check_max_correction(length)?;
        self.max_correction_length = length;
        Ok(())
    }

    /// Check every field
    ///
    /// Deserialized settings skip the constructors, so this runs again
    /// before preprocessing.
    pub fn validate(&self) -> Result<()> {
        if self.history_length == 0 || self.history_length % BLOCK_SIZE != 0 {
            return Err(DeclickError::InvalidSettings {
                reason: format!(
                    "history length {} is not a positive multiple of {}",
                    self.history_length, BLOCK_SIZE
                ),
            });
        }
        if self.coefficients_number == 0 || self.coefficients_number >= self.history_length {
            return Err(DeclickError::InvalidSettings {
                reason: format!(
                    "predictor order {} must be in 1..{}",
                    self.coefficients_number, self.history_length
                ),
            });
        }
        check_threshold(self.detection_threshold)?;
        check_max_correction(self.max_correction_length)
    }

    /// Check the settings against a channel of `samples` samples
    pub fn validate_for(&self, samples: usize) -> Result<()> {
        self.validate()?;
        let required = self.minimum_signal_length();
        if samples < required {
            return Err(DeclickError::SignalTooShort { samples, required });
        }
        Ok(())
    }

    /// Shortest signal these settings can process
    pub fn minimum_signal_length(&self) -> usize {
        2 * self.history_length
    }
}

fn check_threshold(threshold: f32) -> Result<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(DeclickError::InvalidSettings {
            reason: format!("detection threshold {} must be positive and finite", threshold),
        });
    }
    Ok(())
}

fn check_max_correction(length: usize) -> Result<()> {
    if length == 0 {
        return Err(DeclickError::InvalidSettings {
            reason: "maximum correction length must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = ProcessingSettings::default();
        assert_eq!(settings.history_length(), 512);
        assert_eq!(settings.coefficients_number(), 4);
        assert_eq!(settings.detection_threshold(), 10.0);
        assert_eq!(settings.max_correction_length(), 250);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_history_must_be_block_multiple() {
        assert!(ProcessingSettings::new(500, 4).is_err());
        assert!(ProcessingSettings::new(0, 4).is_err());
        assert!(ProcessingSettings::new(64, 4).is_ok());
    }

    #[test]
    fn test_order_bounds() {
        assert!(ProcessingSettings::new(64, 0).is_err());
        assert!(ProcessingSettings::new(64, 64).is_err());
    }

    #[test]
    fn test_setters_reject_invalid_values() {
        let mut settings = ProcessingSettings::default();
        assert!(settings.set_detection_threshold(0.0).is_err());
        assert!(settings.set_detection_threshold(f32::NAN).is_err());
        assert!(settings.set_max_correction_length(0).is_err());
        assert_eq!(settings, ProcessingSettings::default());

        settings.set_detection_threshold(4.5).unwrap();
        settings.set_max_correction_length(100).unwrap();
        assert_eq!(settings.detection_threshold(), 4.5);
        assert_eq!(settings.max_correction_length(), 100);
    }

    #[test]
    fn test_validate_for_short_signal() {
        let settings = ProcessingSettings::default();
        let err = settings.validate_for(1000).unwrap_err();
        assert_eq!(err.error_code(), "SIGNAL_TOO_SHORT");
        assert!(settings.validate_for(1024).is_ok());
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "detection_threshold": 7.5 }}"#).unwrap();

        let settings = ProcessingSettings::from_json_file(file.path()).unwrap();
        assert_eq!(settings.detection_threshold(), 7.5);
        assert_eq!(settings.history_length(), DEFAULT_HISTORY_LENGTH);
    }

    #[test]
    fn test_json_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "history_length": 100 }}"#).unwrap();

        let err = ProcessingSettings::from_json_file(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SETTINGS");
    }
}
