//! Declick - Click and Pop Repair
//!
//! Detects and repairs short impulsive distortions in digitized audio with
//! adaptive linear prediction, leaving undamaged samples untouched.
//!
//! # Architecture
//!
//! - `dsp`: Burg predictor, error-average baseline, detector, repairer and
//!   the boundary search that fits each damaged run
//! - `engine`: channel storage, mono/stereo signals, the click registry and
//!   the parallel scan orchestrator, plus WAV import/export
//! - `cli`: the `declick-cli` command-line front end
//!
//! # Example
//! ```no_run
//! use std::path::Path;
//! use declick::engine::{export_wav, import_wav, ClickScanner};
//! use declick::ProcessingSettings;
//!
//! # fn main() -> declick::Result<()> {
//! let mut signal = import_wav(Path::new("record.wav"), ProcessingSettings::default())?;
//! signal.scan_all(&ClickScanner::new(), None)?;
//! export_wav(&signal, Path::new("record-repaired.wav"), 24)?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod settings;

pub use engine::{AudioSignal, Channel, ChannelTag, Click, ClickResize, ClickScanner, SignalId};
pub use error::{DeclickError, Result};
pub use settings::ProcessingSettings;
