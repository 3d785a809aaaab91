//! Metrics collection for revalidation

/// Counters collected while revalidating a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevalidationMetrics {
    /// Single-field checks scheduled
    pub singles_scheduled: usize,

    /// Pending single-field timers replaced by a later edit
    pub debounces_superseded: usize,

    /// Batches started
    pub batches_run: usize,

    /// Checks handed to the provider
    pub checks_started: usize,

    /// Checks whose results were applied
    pub checks_applied: usize,

    /// Results discarded because a newer check was scheduled
    pub stale_discarded: usize,

    /// Provider failures (errors and panics)
    pub provider_failures: usize,
}

impl RevalidationMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        [
            "Revalidation Metrics Summary".to_string(),
            "============================".to_string(),
            format!(
                "Single checks scheduled: {} ({} superseded)",
                self.singles_scheduled, self.debounces_superseded
            ),
            format!("Batches run: {}", self.batches_run),
            format!("Checks started: {}", self.checks_started),
            format!("Checks applied: {}", self.checks_applied),
            format!("Stale results discarded: {}", self.stale_discarded),
            format!("Provider failures: {}", self.provider_failures),
        ]
        .join("\n")
    }
}
