mod bitrate;
mod loss;
pub mod nal;
mod report;

pub use bitrate::BitrateMeter;
pub use loss::{loss_rate_percent, SequenceEvent, SequenceLossEstimator};
pub use nal::FrameTypeAccumulator;
pub use report::{CheckResult, RunSummary, StreamStat};
