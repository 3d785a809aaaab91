//! Dependency-driven revalidation
//!
//! State machine per session:
//!
//! ```text
//! Idle -> ScheduledSingle -> Checking -> Idle
//!                               |
//!                               +-> ScheduledBatch -> Checking -> Idle
//! ```
//!
//! An edit schedules a debounced check of the changed field. When that check
//! completes, the field's non-blank transitive dependents are queued and
//! re-checked together after the longer batch debounce. Scheduling or
//! starting a check bumps the field's sequence number; a result carrying an
//! older number was superseded and is dropped.

use crate::metrics::RevalidationMetrics;
use crate::scheduler::{Scheduler, TaskKey, TaskPurpose};
use crate::RevalidatorConfig;
use keel_domain::{ConsistencyChecker, FieldId, FieldRegistry, FieldValue, Snapshot};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Where the revalidator is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationState {
    /// Nothing pending
    Idle,
    /// A single-field check is waiting for its debounce
    ScheduledSingle,
    /// A dependent batch is waiting for its debounce
    ScheduledBatch,
    /// Checks are running
    Checking,
}

/// Whether a check came from an edit or from a dependent batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// The edited field itself
    Single,
    /// A dependent of an edited field
    Batch,
}

/// Outcome of one provider call
#[derive(Debug, Clone)]
pub struct CheckCompletion {
    /// Field checked
    pub field: FieldId,
    /// Sequence number the check was started with
    pub seq: u64,
    /// Single or batch
    pub kind: CheckKind,
    /// Value the check saw
    pub value: Option<FieldValue>,
    /// Warnings, or the provider's error message
    pub result: Result<Vec<String>, String>,
}

/// Revalidation engine for one editing session
pub struct Revalidator<C> {
    config: RevalidatorConfig,
    registry: Arc<FieldRegistry>,
    checker: Arc<C>,
    tracked: BTreeSet<FieldId>,
    /// Values at the end of the last validation pass
    validated: BTreeMap<FieldId, Option<FieldValue>>,
    /// Values captured when a single check was scheduled
    pending: BTreeMap<FieldId, Option<FieldValue>>,
    seqs: HashMap<FieldId, u64>,
    batch: BTreeSet<FieldId>,
    checks: JoinSet<CheckCompletion>,
    metrics: RevalidationMetrics,
}

impl<C> Revalidator<C>
where
    C: ConsistencyChecker + 'static,
{
    /// Create a revalidator over the given registry and provider
    pub fn new(config: RevalidatorConfig, registry: Arc<FieldRegistry>, checker: Arc<C>) -> Self {
        let tracked = registry.tracked_fields();
        Self {
            config,
            registry,
            checker,
            tracked,
            validated: BTreeMap::new(),
            pending: BTreeMap::new(),
            seqs: HashMap::new(),
            batch: BTreeSet::new(),
            checks: JoinSet::new(),
            metrics: RevalidationMetrics::new(),
        }
    }

    /// Treat the current values as already validated
    ///
    /// Called once with the hydrated record so opening a session does not
    /// re-check every field.
    pub fn prime(&mut self, snapshot: &Snapshot) {
        self.validated = self
            .tracked
            .iter()
            .map(|f| (f.clone(), snapshot.value(f).cloned()))
            .collect();
        self.pending.clear();
        self.batch.clear();
    }

    /// Schedule checks for fields changed by the last mutation
    ///
    /// `edited` fields are always scheduled. Other fields in the dependency
    /// graph are scheduled when their value differs from both the last
    /// validated value and any value already pending.
    pub fn observe(&mut self, snapshot: &Snapshot, edited: &[FieldId], scheduler: &mut Scheduler) {
        let mut changed: BTreeSet<FieldId> = edited.iter().cloned().collect();

        for field in &self.tracked {
            let current = snapshot.value(field);
            let validated = self.validated.get(field).and_then(Option::as_ref);
            if validated == current {
                continue;
            }
            let already_pending = self
                .pending
                .get(field)
                .is_some_and(|pending| pending.as_ref() == current);
            if !already_pending {
                changed.insert(field.clone());
            }
        }

        for field in changed {
            self.pending
                .insert(field.clone(), snapshot.value(&field).cloned());
            self.bump(&field);
            self.batch.remove(&field);

            if scheduler.schedule(TaskKey::field(field.clone()), self.config.single_debounce()) {
                self.metrics.debounces_superseded += 1;
            }
            self.metrics.singles_scheduled += 1;
            debug!(field = %field, "Single-field check scheduled");
        }
    }

    /// Start the checks for a fired timer
    ///
    /// A batch larger than `max_batch_size` runs its first fields now and
    /// requeues the rest as an immediate follow-up batch. Returns `false` for
    /// timers that are not validation timers.
    pub fn fire(&mut self, key: &TaskKey, snapshot: &Snapshot, scheduler: &mut Scheduler) -> bool {
        match (key.purpose, &key.field) {
            (TaskPurpose::ValidateField, Some(field)) => {
                let seq = self.bump(field);
                self.spawn_check(field.clone(), seq, CheckKind::Single, snapshot);
                true
            }
            (TaskPurpose::ValidateBatch, _) => {
                let queued = std::mem::take(&mut self.batch);
                let mut fields: Vec<FieldId> = queued
                    .into_iter()
                    .filter(|f| snapshot.value(f).is_some_and(|v| !v.is_blank()))
                    .collect();
                if fields.len() > self.config.max_batch_size {
                    let overflow = fields.split_off(self.config.max_batch_size);
                    debug!(deferred = overflow.len(), "Batch split at max_batch_size");
                    self.batch.extend(overflow);
                    scheduler.schedule(TaskKey::batch(), Duration::ZERO);
                }
                if fields.is_empty() {
                    return true;
                }

                self.metrics.batches_run += 1;
                debug!(fields = fields.len(), "Dependent batch started");
                for field in fields {
                    let seq = self.bump(&field);
                    self.spawn_check(field, seq, CheckKind::Batch, snapshot);
                }
                true
            }
            _ => false,
        }
    }

    fn spawn_check(&mut self, field: FieldId, seq: u64, kind: CheckKind, snapshot: &Snapshot) {
        let checker = Arc::clone(&self.checker);
        let record = snapshot.clone();
        let value = record.value(&field).cloned();
        self.metrics.checks_started += 1;

        self.checks.spawn(async move {
            let existing = record.provenance(&field);
            let result = checker
                .check(&field, value.as_ref(), &record, existing)
                .await
                .map_err(|e| e.to_string());
            CheckCompletion {
                field,
                seq,
                kind,
                value,
                result,
            }
        });
    }

    /// Wait for the next running check to finish
    ///
    /// Cancel safe. Returns `None` when nothing is running.
    pub async fn next_completion(&mut self) -> Option<CheckCompletion> {
        while let Some(joined) = self.checks.join_next().await {
            match joined {
                Ok(completion) => return Some(completion),
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    error!(error = %e, "Consistency check task panicked");
                    self.metrics.provider_failures += 1;
                }
            }
        }
        None
    }

    /// Apply a finished check to the snapshot
    ///
    /// Returns whether the snapshot's warnings changed. Stale results are
    /// dropped. Provider errors leave the previous warnings in place.
    pub fn apply(
        &mut self,
        completion: CheckCompletion,
        snapshot: &mut Snapshot,
        scheduler: &mut Scheduler,
    ) -> bool {
        let CheckCompletion {
            field,
            seq,
            kind,
            value,
            result,
        } = completion;

        if self.current_seq(&field) != seq {
            self.metrics.stale_discarded += 1;
            debug!(field = %field, seq, "Stale check result discarded");
            return false;
        }

        self.pending.remove(&field);
        if self.tracked.contains(&field) {
            self.validated.insert(field.clone(), value);
        }

        let changed = match result {
            Ok(warnings) => {
                self.metrics.checks_applied += 1;
                snapshot.set_warnings(&field, warnings)
            }
            Err(e) => {
                warn!(field = %field, error = %e, "Consistency check failed; keeping previous warnings");
                self.metrics.provider_failures += 1;
                false
            }
        };

        if kind == CheckKind::Single {
            let dependents: Vec<FieldId> = self
                .registry
                .transitive_dependents(&field)
                .into_iter()
                .filter(|f| snapshot.value(f).is_some_and(|v| !v.is_blank()))
                .collect();
            if !dependents.is_empty() {
                debug!(field = %field, dependents = dependents.len(), "Dependent batch scheduled");
                self.batch.extend(dependents);
                scheduler.schedule(TaskKey::batch(), self.config.batch_debounce());
            }
        }

        changed
    }

    /// Drive timers and checks until nothing is pending
    ///
    /// Timers with other purposes are dropped. Sessions run their own loop;
    /// this is for standalone use.
    pub async fn run_until_idle(&mut self, snapshot: &mut Snapshot, scheduler: &mut Scheduler) {
        loop {
            tokio::select! {
                Some(key) = scheduler.next_fired(), if scheduler.pending() > 0 => {
                    if !self.fire(&key, snapshot, scheduler) {
                        debug!(key = %key, "Ignoring non-validation timer");
                    }
                }
                Some(completion) = self.next_completion(), if self.is_checking() => {
                    self.apply(completion, snapshot, scheduler);
                }
                else => break,
            }
        }
    }

    /// Abort running checks and forget queued work
    pub fn shutdown(&mut self, scheduler: &mut Scheduler) {
        self.checks.abort_all();
        self.checks.detach_all();
        for field in self.pending.keys() {
            scheduler.cancel(&TaskKey::field(field.clone()));
        }
        scheduler.cancel(&TaskKey::batch());
        self.pending.clear();
        self.batch.clear();
    }

    /// Whether any check is running
    pub fn is_checking(&self) -> bool {
        !self.checks.is_empty()
    }

    /// Current position in the cycle
    pub fn state(&self, scheduler: &Scheduler) -> RevalidationState {
        if self.is_checking() {
            RevalidationState::Checking
        } else if scheduler.has_pending(TaskPurpose::ValidateField) {
            RevalidationState::ScheduledSingle
        } else if scheduler.has_pending(TaskPurpose::ValidateBatch) {
            RevalidationState::ScheduledBatch
        } else {
            RevalidationState::Idle
        }
    }

    /// Collected counters
    pub fn metrics(&self) -> &RevalidationMetrics {
        &self.metrics
    }

    fn current_seq(&self, field: &FieldId) -> u64 {
        self.seqs.get(field).copied().unwrap_or(0)
    }

    fn bump(&mut self, field: &FieldId) -> u64 {
        let seq = self.seqs.entry(field.clone()).or_insert(0);
        *seq += 1;
        *seq
    }
}
