//! Editing session and save controller
//!
//! One [`EditSession`] owns the working snapshot of a record, the persisted
//! baseline it is compared against, and every timer and task working on it.
//! All state is mutated on the caller's task; the timers, consistency checks
//! and durable saves only report back through [`EditSession::next_event`].
//!
//! The session is `Clean` when the snapshot equals the baseline and `Dirty`
//! otherwise. Dirtiness gates all three save paths: the debounced local draft,
//! the explicit save and the implicit save on [`EditSession::close`].

use crate::config::SessionConfig;
use crate::draft::DraftEnvelope;
use crate::SessionError;
use keel_domain::{
    ConsistencyChecker, DataType, DomainError, DraftStore, EditEffect, FieldId, FieldRegistry,
    FieldState, FieldValue, LockOutcome, PersistenceProvider, RecordId, SaveOptions,
    SectionLockOutcome, Snapshot, VersionId,
};
use keel_revalidator::{
    CheckCompletion, RevalidationMetrics, RevalidationState, Revalidator, Scheduler, TaskKey,
    TaskPurpose,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Handle identifying one requested save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveTicket(u64);

/// Result of an explicit save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new version was written
    Persisted {
        /// Version id returned by the provider
        version: VersionId,
    },
    /// The session was clean; nothing was written
    Unchanged,
}

/// Result of closing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Nothing unsaved; no write
    Clean,
    /// An explicit save of the same snapshot was in flight and was awaited
    /// instead of writing a second version
    AwaitedInFlight {
        /// Version written by the explicit save
        version: VersionId,
    },
    /// The implicit teardown save wrote a new version
    Persisted {
        /// Version written on teardown
        version: VersionId,
    },
}

/// Something observable that happened while driving the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The local draft was written
    DraftWritten,
    /// A consistency check changed a field's warnings
    WarningsChanged {
        /// Field whose warnings changed
        field: FieldId,
    },
    /// A save completed
    Saved {
        /// Request that completed
        ticket: SaveTicket,
        /// Version written
        version: VersionId,
    },
    /// A save failed; the session stays dirty
    SaveFailed {
        /// Request that failed
        ticket: SaveTicket,
        /// Provider error message
        error: String,
    },
    /// A queued save found nothing left to write
    SaveSkipped {
        /// Request that was skipped
        ticket: SaveTicket,
    },
}

/// Collaborators an editing session talks to
pub struct Collaborators<P, D, C> {
    /// Durable version store
    pub persistence: Arc<P>,
    /// Local recovery drafts
    pub drafts: D,
    /// Consistency-check provider
    pub checker: Arc<C>,
}

struct PendingSave {
    ticket: SaveTicket,
    snapshot: Snapshot,
}

/// Editing session for one record
pub struct EditSession<P, D, C> {
    config: SessionConfig,
    record: RecordId,
    registry: Arc<FieldRegistry>,
    persistence: Arc<P>,
    drafts: D,
    current: Snapshot,
    baseline: Snapshot,
    scheduler: Scheduler,
    revalidator: Revalidator<C>,
    saves: JoinSet<Result<VersionId, String>>,
    in_flight: Option<PendingSave>,
    queued: Option<SaveTicket>,
    ready: VecDeque<SessionEvent>,
    next_ticket: u64,
    grace_until: Option<Instant>,
    restored_from_draft: bool,
    last_version: Option<VersionId>,
}

impl<P, D, C> EditSession<P, D, C>
where
    P: PersistenceProvider + 'static,
    D: DraftStore,
    C: ConsistencyChecker + 'static,
{
    /// Open a session over the latest persisted `baseline`
    ///
    /// A local draft for the same record replaces the baseline as the working
    /// snapshot and starts the restoration grace window. A draft that cannot
    /// be read or decoded is dropped and the session starts from the baseline.
    pub fn open(
        config: SessionConfig,
        record: RecordId,
        registry: Arc<FieldRegistry>,
        collaborators: Collaborators<P, D, C>,
        baseline: Snapshot,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let Collaborators {
            persistence,
            drafts,
            checker,
        } = collaborators;

        let revalidator = Revalidator::new(config.revalidation.clone(), Arc::clone(&registry), checker);
        let mut session = Self {
            config,
            record,
            registry,
            persistence,
            drafts,
            current: baseline.clone(),
            baseline,
            scheduler: Scheduler::new(),
            revalidator,
            saves: JoinSet::new(),
            in_flight: None,
            queued: None,
            ready: VecDeque::new(),
            next_ticket: 0,
            grace_until: None,
            restored_from_draft: false,
            last_version: None,
        };

        if let Some(snapshot) = session.read_draft() {
            info!(record = %record, "Restored unsaved draft");
            session.current = snapshot;
            session.restored_from_draft = true;
            session.grace_until = Some(Instant::now() + session.config.restore_grace());
        }

        session.revalidator.prime(&session.current);
        Ok(session)
    }

    fn draft_key(&self) -> String {
        self.config.draft_key(self.record)
    }

    fn read_draft(&mut self) -> Option<Snapshot> {
        let key = self.draft_key();
        let payload = match self.drafts.get(&key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!(record = %self.record, error = %e, "Could not read local draft; using persisted version");
                return None;
            }
        };

        let envelope = match DraftEnvelope::decode(&payload) {
            Ok(envelope) if envelope.record == self.record => envelope,
            Ok(envelope) => {
                warn!(record = %self.record, draft_record = %envelope.record, "Draft belongs to another record; discarding");
                self.remove_draft();
                return None;
            }
            Err(e) => {
                warn!(record = %self.record, error = %e, "Corrupt local draft; discarding");
                self.remove_draft();
                return None;
            }
        };

        if envelope.snapshot == self.baseline {
            debug!(record = %self.record, "Draft matches persisted version; discarding");
            self.remove_draft();
            return None;
        }
        Some(envelope.snapshot)
    }

    // ---- queries ----

    /// Record being edited
    pub fn record(&self) -> RecordId {
        self.record
    }

    /// Field registry
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Working snapshot
    pub fn snapshot(&self) -> &Snapshot {
        &self.current
    }

    /// Last persisted snapshot
    pub fn baseline(&self) -> &Snapshot {
        &self.baseline
    }

    /// Whether the working snapshot differs from the baseline
    pub fn is_dirty(&self) -> bool {
        self.current != self.baseline
    }

    /// Display state of a field
    pub fn classify(&self, field: &FieldId) -> FieldState {
        self.current.classify(field)
    }

    /// Active warnings of a field
    pub fn warnings(&self, field: &FieldId) -> &[String] {
        self.current.warnings(field)
    }

    /// Effective lock state of a field
    pub fn is_locked(&self, field: &FieldId) -> bool {
        self.current.is_locked(field)
    }

    /// Share of required fields holding a value
    pub fn completeness_percent(&self) -> u8 {
        self.current.completeness_percent(&self.registry)
    }

    /// Whether the session was hydrated from a local draft
    pub fn restored_from_draft(&self) -> bool {
        self.restored_from_draft
    }

    /// Whether persisted versions are currently being ignored
    pub fn in_grace_window(&self) -> bool {
        self.grace_until.is_some_and(|until| Instant::now() < until)
    }

    /// Whether a durable save is running
    pub fn is_save_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Version written by the last successful save
    pub fn last_version(&self) -> Option<VersionId> {
        self.last_version
    }

    /// Where revalidation is in its cycle
    pub fn revalidation_state(&self) -> RevalidationState {
        self.revalidator.state(&self.scheduler)
    }

    /// Revalidation counters
    pub fn revalidation_metrics(&self) -> &RevalidationMetrics {
        self.revalidator.metrics()
    }

    // ---- mutations ----

    fn known_field(&self, field: &FieldId) -> Result<(), SessionError> {
        if self.registry.contains(field) {
            Ok(())
        } else {
            Err(DomainError::UnknownField(field.to_string()).into())
        }
    }

    /// Apply a value typed by the user; `None` clears the field
    pub fn record_user_edit(
        &mut self,
        field: &FieldId,
        value: Option<FieldValue>,
    ) -> Result<EditEffect, SessionError> {
        self.known_field(field)?;
        let effect = self.current.record_user_edit(field, value);
        if let EditEffect::Reverted { restored } = &effect {
            debug!(field = %field, source = %restored, "User edit restored proposed value");
        }
        self.after_mutation(vec![field.clone()]);
        Ok(effect)
    }

    /// Apply one value from an external producer
    ///
    /// Returns `false` when the field is locked and nothing changed.
    pub fn record_external_value(
        &mut self,
        field: &FieldId,
        value: Option<FieldValue>,
        source_id: &str,
    ) -> Result<bool, SessionError> {
        self.known_field(field)?;
        let applied = self.current.record_external_value(field, value, source_id);
        if applied {
            self.after_mutation(vec![field.clone()]);
        } else {
            debug!(field = %field, source = source_id, "External value ignored for locked field");
        }
        Ok(applied)
    }

    /// Apply a burst of external values from one source
    ///
    /// Each value is subject to lock immunity on its own. Returns the fields
    /// that were written. Unknown fields fail the whole burst before anything
    /// is applied.
    pub fn apply_autofill<I>(&mut self, values: I, source_id: &str) -> Result<Vec<FieldId>, SessionError>
    where
        I: IntoIterator<Item = (FieldId, Option<FieldValue>)>,
    {
        let values: Vec<_> = values.into_iter().collect();
        for (field, _) in &values {
            self.known_field(field)?;
        }

        let applied: Vec<FieldId> = values
            .into_iter()
            .filter_map(|(field, value)| {
                self.current
                    .record_external_value(&field, value, source_id)
                    .then_some(field)
            })
            .collect();

        info!(source = source_id, applied = applied.len(), "Autofill applied");
        if !applied.is_empty() {
            self.after_mutation(applied.clone());
        }
        Ok(applied)
    }

    /// Toggle one field's lock
    pub fn toggle_field_lock(&mut self, field: &FieldId) -> Result<LockOutcome, SessionError> {
        self.known_field(field)?;
        let outcome = self.current.toggle_field_lock(field);
        match outcome {
            LockOutcome::Rejected(reason) => {
                debug!(field = %field, reason = reason.message(), "Lock rejected");
            }
            _ => self.after_mutation(Vec::new()),
        }
        Ok(outcome)
    }

    /// Toggle the lock of every field in a registry section
    pub fn toggle_section_lock(&mut self, section: &str) -> Result<SectionLockOutcome, SessionError> {
        let fields = self
            .registry
            .section(section)
            .map(|s| s.fields.clone())
            .ok_or_else(|| SessionError::UnknownSection(section.to_string()))?;
        let outcome = self.current.toggle_section_lock(&fields);
        if !outcome.locked.is_empty() || !outcome.unlocked.is_empty() {
            self.after_mutation(Vec::new());
        }
        Ok(outcome)
    }

    /// Whether toggling the section would unlock it
    pub fn is_section_locked(&self, section: &str) -> bool {
        self.registry
            .section(section)
            .is_some_and(|s| self.current.is_section_locked(&s.fields))
    }

    fn after_mutation(&mut self, mut edited: Vec<FieldId>) {
        edited.extend(self.recompute_derived());
        self.revalidator.observe(&self.current, &edited, &mut self.scheduler);
        self.schedule_draft();
    }

    /// Recompute derived ratios, returning the targets written
    fn recompute_derived(&mut self) -> Vec<FieldId> {
        let tolerance = self.registry.tolerance();
        let mut written = Vec::new();

        for derived in self.registry.derived() {
            let target = &derived.target;
            if self.current.is_locked(target) {
                continue;
            }
            let numerator = self.current.value(&derived.numerator).and_then(FieldValue::as_f64);
            let denominator = self.current.value(&derived.denominator).and_then(FieldValue::as_f64);
            let Some(computed) = derived.compute(numerator, denominator) else {
                continue;
            };
            let existing = self.current.value(target).and_then(FieldValue::as_f64);
            if existing.is_some_and(|v| (v - computed).abs() <= tolerance) {
                continue;
            }

            let data_type = self.registry.data_type(target);
            let Some(value) = derived_value(data_type, computed) else {
                warn!(field = %target, data_type = ?data_type, "Derived target is not numeric; skipped");
                continue;
            };
            if self
                .current
                .record_external_value(target, Some(value), &derived.source_id)
            {
                debug!(field = %target, value = computed, "Derived field recomputed");
                written.push(target.clone());
            }
        }
        written
    }

    // ---- drafts ----

    fn schedule_draft(&mut self) {
        if !self.is_dirty() {
            self.scheduler.cancel(&TaskKey::draft());
            self.remove_draft();
        } else if self.current.has_meaningful_content() {
            self.scheduler
                .schedule(TaskKey::draft(), self.config.draft_debounce());
        }
    }

    fn write_draft(&mut self) -> bool {
        if !self.is_dirty() || !self.current.has_meaningful_content() {
            return false;
        }
        let key = self.draft_key();
        let payload = match DraftEnvelope::new(self.record, self.current.clone()).encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(record = %self.record, error = %e, "Could not encode local draft");
                return false;
            }
        };
        match self.drafts.put(&key, &payload) {
            Ok(()) => {
                debug!(record = %self.record, "Local draft written");
                true
            }
            Err(e) => {
                warn!(record = %self.record, error = %e, "Could not write local draft");
                false
            }
        }
    }

    fn remove_draft(&mut self) {
        let key = self.draft_key();
        if let Err(e) = self.drafts.remove(&key) {
            warn!(record = %self.record, error = %e, "Could not remove local draft");
        }
    }

    // ---- saves ----

    fn allocate_ticket(&mut self) -> SaveTicket {
        self.next_ticket += 1;
        SaveTicket(self.next_ticket)
    }

    fn start_save(&mut self, ticket: SaveTicket, options: SaveOptions) {
        let snapshot = self.current.clone();
        let to_save = snapshot.clone();
        let persistence = Arc::clone(&self.persistence);
        let record = self.record;

        self.saves.spawn(async move {
            persistence
                .save(record, &to_save, options)
                .await
                .map_err(|e| e.to_string())
        });
        self.in_flight = Some(PendingSave { ticket, snapshot });
        debug!(record = %record, ?options, "Save started");
    }

    /// Request an explicit save without waiting for it
    ///
    /// Returns `None` when the session is clean. Asking again for a snapshot
    /// that is already being saved returns the running request. Saves never
    /// overlap: a request made while a different snapshot is being written
    /// runs after it, with whatever is current at that point.
    pub fn request_save(&mut self) -> Option<SaveTicket> {
        if let Some(pending) = &self.in_flight {
            if pending.snapshot == self.current {
                return Some(pending.ticket);
            }
            if let Some(ticket) = self.queued {
                return Some(ticket);
            }
            let ticket = self.allocate_ticket();
            self.queued = Some(ticket);
            return Some(ticket);
        }

        if !self.is_dirty() {
            debug!(record = %self.record, "Save requested on clean session; nothing to do");
            return None;
        }
        let ticket = self.allocate_ticket();
        self.start_save(ticket, SaveOptions::new_version());
        Some(ticket)
    }

    /// Explicit save: persist a new version if dirty and wait for it
    ///
    /// Other events that occur while waiting are handled and dropped.
    pub async fn save(&mut self) -> Result<SaveOutcome, SessionError> {
        let Some(ticket) = self.request_save() else {
            return Ok(SaveOutcome::Unchanged);
        };

        while let Some(event) = self.next_event().await {
            match event {
                SessionEvent::Saved { ticket: t, version } if t == ticket => {
                    return Ok(SaveOutcome::Persisted { version });
                }
                SessionEvent::SaveFailed { ticket: t, error } if t == ticket => {
                    return Err(SessionError::Persist(error));
                }
                SessionEvent::SaveSkipped { ticket: t } if t == ticket => {
                    return Ok(SaveOutcome::Unchanged);
                }
                _ => {}
            }
        }
        Err(SessionError::Persist("save request was lost".into()))
    }

    fn finish_save(&mut self, joined: Result<Result<VersionId, String>, JoinError>) -> Option<SessionEvent> {
        let pending = self.in_flight.take()?;
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err("save was cancelled".to_string()),
            Err(e) => Err(format!("save task panicked: {}", e)),
        };

        let event = match result {
            Ok(version) => {
                info!(record = %self.record, version = %version, "Version persisted");
                self.baseline = pending.snapshot;
                self.last_version = Some(version);
                self.remove_draft();
                if self.is_dirty() {
                    self.schedule_draft();
                } else {
                    self.scheduler.cancel(&TaskKey::draft());
                }
                SessionEvent::Saved {
                    ticket: pending.ticket,
                    version,
                }
            }
            Err(error) => {
                error!(record = %self.record, error = %error, "Persist failed; keeping draft and dirty state");
                SessionEvent::SaveFailed {
                    ticket: pending.ticket,
                    error,
                }
            }
        };

        if let Some(ticket) = self.queued.take() {
            if self.is_dirty() {
                self.start_save(ticket, SaveOptions::new_version());
            } else {
                self.ready.push_back(SessionEvent::SaveSkipped { ticket });
            }
        }
        Some(event)
    }

    async fn await_in_flight(&mut self) -> Option<SessionEvent> {
        self.in_flight.as_ref()?;
        let joined = self.saves.join_next().await?;
        self.finish_save(joined)
    }

    /// Persist the current lock set without growing history
    ///
    /// Writes the baseline values with the working locks as a maintenance
    /// write, so external producers see which fields are frozen. Only the
    /// baseline's locks advance. Returns `None` when the locks already match.
    ///
    /// Running and queued saves finish first, so the in-place write never
    /// lands on top of a version appended after the baseline was taken. Their
    /// events stay available to `next_event`.
    pub async fn sync_lock_state(&mut self) -> Result<Option<VersionId>, SessionError> {
        while self.in_flight.is_some() {
            match self.await_in_flight().await {
                Some(event) => self.ready.push_back(event),
                None => break,
            }
        }

        if self.baseline.locks == self.current.locks {
            return Ok(None);
        }
        let mut snapshot = self.baseline.clone();
        snapshot.locks = self.current.locks.clone();

        let version = self
            .persistence
            .save(self.record, &snapshot, SaveOptions::maintenance())
            .await
            .map_err(|e| {
                error!(record = %self.record, error = %e, "Lock sync failed");
                SessionError::Persist(e.to_string())
            })?;

        info!(record = %self.record, version = %version, "Lock state synced");
        self.baseline.locks = snapshot.locks;
        if !self.is_dirty() {
            self.scheduler.cancel(&TaskKey::draft());
            self.remove_draft();
        }
        Ok(Some(version))
    }

    /// Accept a freshly fetched persisted version
    ///
    /// Ignored during the restoration grace window. Otherwise it becomes the
    /// baseline and, when the session is clean, the working snapshot too.
    /// Returns whether it was accepted.
    pub fn apply_persisted_version(&mut self, snapshot: Snapshot) -> bool {
        if self.in_grace_window() {
            info!(record = %self.record, "Persisted version ignored during restoration grace window");
            return false;
        }
        let was_clean = !self.is_dirty();
        self.baseline = snapshot;
        if was_clean {
            self.current = self.baseline.clone();
            self.revalidator.prime(&self.current);
        }
        self.schedule_draft();
        true
    }

    // ---- event loop ----

    /// Drive timers, checks and saves until something observable happens
    ///
    /// Returns `None` once nothing is pending.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }

            let event = tokio::select! {
                Some(key) = self.scheduler.next_fired(), if self.scheduler.pending() > 0 => {
                    self.on_timer(key)
                }
                Some(completion) = self.revalidator.next_completion(), if self.revalidator.is_checking() => {
                    self.on_check(completion)
                }
                Some(joined) = self.saves.join_next(), if !self.saves.is_empty() => {
                    self.finish_save(joined)
                }
                else => return None,
            };

            if let Some(event) = event {
                return Some(event);
            }
        }
    }

    /// Run until no timer, check or save is pending
    pub async fn settle(&mut self) {
        while self.next_event().await.is_some() {}
    }

    fn on_timer(&mut self, key: TaskKey) -> Option<SessionEvent> {
        match key.purpose {
            TaskPurpose::DraftSave => self.write_draft().then_some(SessionEvent::DraftWritten),
            TaskPurpose::ValidateField | TaskPurpose::ValidateBatch => {
                self.revalidator.fire(&key, &self.current, &mut self.scheduler);
                None
            }
        }
    }

    fn on_check(&mut self, completion: CheckCompletion) -> Option<SessionEvent> {
        let field = completion.field.clone();
        if !self
            .revalidator
            .apply(completion, &mut self.current, &mut self.scheduler)
        {
            return None;
        }
        self.schedule_draft();
        Some(SessionEvent::WarningsChanged { field })
    }

    // ---- teardown ----

    /// End the session
    ///
    /// Cancels every timer and running check. An explicit save already in
    /// flight is awaited; if it covered the current snapshot no second version
    /// is written. Otherwise a dirty session is saved as a new version with
    /// teardown options. On failure the local draft is left for recovery.
    pub async fn close(mut self) -> Result<CloseOutcome, SessionError> {
        self.revalidator.shutdown(&mut self.scheduler);
        self.scheduler.cancel_all();
        self.queued = None;

        if let Some(pending) = &self.in_flight {
            let covers_current = pending.snapshot == self.current;
            match self.await_in_flight().await {
                Some(SessionEvent::Saved { version, .. }) if covers_current => {
                    info!(record = %self.record, version = %version, "Teardown save skipped; explicit save covered it");
                    return Ok(CloseOutcome::AwaitedInFlight { version });
                }
                Some(SessionEvent::SaveFailed { error, .. }) if covers_current => {
                    return Err(SessionError::Persist(error));
                }
                _ => {}
            }
        }

        if !self.is_dirty() {
            debug!(record = %self.record, "Session closed clean");
            return Ok(CloseOutcome::Clean);
        }

        info!(record = %self.record, "Implicit save on teardown");
        self.write_draft();
        let ticket = self.allocate_ticket();
        self.start_save(ticket, SaveOptions::teardown());
        match self.await_in_flight().await {
            Some(SessionEvent::Saved { version, .. }) => Ok(CloseOutcome::Persisted { version }),
            Some(SessionEvent::SaveFailed { error, .. }) => Err(SessionError::Persist(error)),
            _ => Err(SessionError::Persist("teardown save was lost".into())),
        }
    }
}

/// Typed value for a computed ratio, `None` when the target type holds no number.
fn derived_value(data_type: Option<DataType>, computed: f64) -> Option<FieldValue> {
    match data_type? {
        DataType::Currency => Some(FieldValue::Currency(computed)),
        DataType::Integer => Some(FieldValue::Integer(computed.round() as i64)),
        DataType::Percent => Some(FieldValue::Percent(computed)),
        _ => None,
    }
}
