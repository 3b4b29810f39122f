mod gate;
#[cfg(test)]
pub mod memory;
mod output;
mod scheduler;
mod ts;

pub use output::{run_base_id, FileSegmentOpener};
pub use scheduler::{RecordError, SegmentOpener, SegmentScheduler, UnitOutcome};
