//! Audio Engine Module
//!
//! Data model and orchestration around the detection core:
//! - Channel storage and disjoint channel spans
//! - Mono/stereo signals and click registry operations
//! - The parallel scan orchestrator
//! - WAV import and export

pub mod channel;
pub mod click;
pub mod io;
pub mod scan;
pub mod signal;

pub use channel::{Channel, ChannelSpan, SpanSnapshot};
pub use click::{Click, ClickResize};
pub use io::{export_wav, import_wav, supported_bit_depths};
pub use scan::{
    scan_margin, ClickScanner, Partition, ProgressCallback, ScanPhase, ScanPlan, ScanProgress,
    ScanSummary, Segment,
};
pub use signal::{AudioSignal, ChannelTag, Channels, SignalId};
