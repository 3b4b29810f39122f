use std::time::Duration;

/// Payload volume over a wall-clock window.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitrateMeter {
    total_bytes: u64,
}

impl BitrateMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, bytes: usize) {
        self.total_bytes += bytes as u64;
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Kilobits per second over `elapsed`; 0 for an empty window.
    pub fn kbps(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 * 8.0 / secs / 1000.0
    }
}
