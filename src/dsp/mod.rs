//! Detection and Repair Core
//!
//! The numeric side of declicking: a Burg predictor, the block-peak error
//! average, the threshold detector, the repair primitive and the boundary
//! search built on top of them. Everything here works on a
//! [`ChannelSpan`](crate::engine::ChannelSpan) and never allocates per
//! sample once constructed.

mod burg;
mod detector;
mod error_average;
mod length_finder;
mod max_length;
mod repair;

pub use burg::{BurgPredictor, Prediction, DENOMINATOR_FLOOR};
pub use detector::{detection_ratio, ClickDetector, BASELINE_LOOKBACK};
pub use error_average::{align_down, ErrorAverageTracker, BLOCK_SIZE, ERROR_AVERAGE_FLOOR};
pub use length_finder::{
    ClickFit, ClickLengthFinder, SearchOutcome, TrialResult, BOUNDARY_CHECK, DOMINANCE_RATIO,
    SEARCH_BACKTRACK, SETTLE_LIMIT, SETTLE_SAMPLES,
};
pub use max_length::{estimate_max_length, STEP as MAX_LENGTH_STEP};
pub use repair::{ClickRepairer, REPAIRED_ERROR, TRAILING_SAMPLES};
