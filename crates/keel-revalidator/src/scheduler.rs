//! Cancellable debounce timers
//!
//! Every delayed task is keyed by (purpose, field). Scheduling a key that is
//! already pending replaces it, so a later edit always supersedes an earlier
//! one and independent keys never cancel each other.

use keel_domain::FieldId;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Why a timer exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPurpose {
    /// Write the local ephemeral draft
    DraftSave,
    /// Check one edited field
    ValidateField,
    /// Re-check the dependents collected so far
    ValidateBatch,
}

/// Key of one scheduled task
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    /// What the timer is for
    pub purpose: TaskPurpose,
    /// Field the timer belongs to, for per-field purposes
    pub field: Option<FieldId>,
}

impl TaskKey {
    /// Draft-save timer (one per session)
    pub fn draft() -> Self {
        Self {
            purpose: TaskPurpose::DraftSave,
            field: None,
        }
    }

    /// Single-field validation timer
    pub fn field(field: FieldId) -> Self {
        Self {
            purpose: TaskPurpose::ValidateField,
            field: Some(field),
        }
    }

    /// Batch validation timer (one per session)
    pub fn batch() -> Self {
        Self {
            purpose: TaskPurpose::ValidateBatch,
            field: None,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{:?}({})", self.purpose, field),
            None => write!(f, "{:?}", self.purpose),
        }
    }
}

#[derive(Debug)]
struct Fired {
    key: TaskKey,
    generation: u64,
}

/// Set of independent, cancellable one-shot timers
///
/// Fired keys are delivered through [`Scheduler::next_fired`]. A timer that
/// was superseded or cancelled after it already fired is filtered out there.
pub struct Scheduler {
    tx: mpsc::UnboundedSender<Fired>,
    rx: mpsc::UnboundedReceiver<Fired>,
    tasks: HashMap<TaskKey, (u64, JoinHandle<()>)>,
    next_generation: u64,
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            tasks: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Schedule `key` to fire after `delay`, replacing any pending timer for it
    ///
    /// Returns `true` when a pending timer was superseded. Must be called
    /// from within a tokio runtime.
    pub fn schedule(&mut self, key: TaskKey, delay: Duration) -> bool {
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.tx.clone();
        let fired = Fired {
            key: key.clone(),
            generation,
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver lives as long as the scheduler
            let _ = tx.send(fired);
        });

        tracing::debug!(key = %key, delay_ms = delay.as_millis() as u64, "Timer scheduled");

        match self.tasks.insert(key, (generation, handle)) {
            Some((_, previous)) => {
                previous.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel a pending timer, returning whether one existed
    pub fn cancel(&mut self, key: &TaskKey) -> bool {
        match self.tasks.remove(key) {
            Some((_, handle)) => {
                handle.abort();
                tracing::debug!(key = %key, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer
    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.tasks.drain() {
            handle.abort();
        }
    }

    /// Whether any timer with this purpose is pending
    pub fn has_pending(&self, purpose: TaskPurpose) -> bool {
        self.tasks.keys().any(|k| k.purpose == purpose)
    }

    /// Number of pending timers
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next live timer to fire
    ///
    /// Cancel safe. Pends forever when nothing is scheduled, so guard calls
    /// with [`Scheduler::pending`] inside `select!`.
    pub async fn next_fired(&mut self) -> Option<TaskKey> {
        while let Some(fired) = self.rx.recv().await {
            let live = self
                .tasks
                .get(&fired.key)
                .is_some_and(|(generation, _)| *generation == fired.generation);
            if live {
                self.tasks.remove(&fired.key);
                return Some(fired.key);
            }
        }
        None
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let mut scheduler = Scheduler::new();
        let start = tokio::time::Instant::now();
        scheduler.schedule(TaskKey::draft(), ms(1500));

        let key = scheduler.next_fired().await.unwrap();
        assert_eq!(key, TaskKey::draft());
        assert!(start.elapsed() >= ms(1500));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_supersedes() {
        let mut scheduler = Scheduler::new();
        let key = TaskKey::field("loan".into());

        assert!(!scheduler.schedule(key.clone(), ms(300)));
        tokio::time::sleep(ms(200)).await;
        assert!(scheduler.schedule(key.clone(), ms(300)));
        assert_eq!(scheduler.pending(), 1);

        let start = tokio::time::Instant::now();
        assert_eq!(scheduler.next_fired().await, Some(key));
        assert!(start.elapsed() >= ms(300));

        // Nothing else arrives
        let extra = tokio::time::timeout(ms(5000), scheduler.next_fired()).await;
        assert!(extra.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_after_firing_is_filtered() {
        let mut scheduler = Scheduler::new();
        let key = TaskKey::field("loan".into());

        scheduler.schedule(key.clone(), ms(10));
        // Let the first timer fire without consuming it
        tokio::time::sleep(ms(50)).await;
        scheduler.schedule(key.clone(), ms(100));

        let start = tokio::time::Instant::now();
        assert_eq!(scheduler.next_fired().await, Some(key));
        assert!(start.elapsed() >= ms(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TaskKey::field("a".into()), ms(300));
        scheduler.schedule(TaskKey::field("b".into()), ms(300));
        scheduler.schedule(TaskKey::batch(), ms(1000));

        assert!(scheduler.cancel(&TaskKey::field("a".into())));
        assert!(!scheduler.cancel(&TaskKey::field("a".into())));

        assert_eq!(scheduler.next_fired().await, Some(TaskKey::field("b".into())));
        assert_eq!(scheduler.next_fired().await, Some(TaskKey::batch()));
        assert!(!scheduler.has_pending(TaskPurpose::ValidateField));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TaskKey::draft(), ms(10));
        scheduler.schedule(TaskKey::batch(), ms(10));
        scheduler.cancel_all();

        let fired = tokio::time::timeout(ms(1000), scheduler.next_fired()).await;
        assert!(fired.is_err());
        assert_eq!(scheduler.pending(), 0);
    }
}
