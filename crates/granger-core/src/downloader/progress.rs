//! Progress snapshots sent while a download runs.
//!
//! Consumers can derive rate = bytes_done / elapsed_secs and
//! ETA = (total_bytes - bytes_done) / rate.

/// Snapshot taken after each fragment is written.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    /// Bytes handed to the sink so far.
    pub bytes_done: u64,
    /// Resource size, when discovery reported one.
    pub total_bytes: Option<u64>,
    /// Seconds since the download started.
    pub elapsed_secs: f64,
    pub fragments_done: usize,
    pub fragment_count: usize,
}

impl ProgressStats {
    /// Download rate in bytes per second (0 if no time has elapsed).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining; `None` if the size or rate is unknown.
    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.total_bytes?;
        let remaining = total.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0]. Falls back to fragment counts when
    /// the size is unknown.
    pub fn fraction(&self) -> f64 {
        match self.total_bytes {
            Some(0) => 1.0,
            Some(total) => (self.bytes_done as f64 / total as f64).min(1.0),
            None if self.fragment_count == 0 => 0.0,
            None => (self.fragments_done as f64 / self.fragment_count as f64).min(1.0),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.fragments_done >= self.fragment_count
    }
}
