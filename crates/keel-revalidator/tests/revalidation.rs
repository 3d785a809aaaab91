//! Revalidation timing and ordering tests (paused tokio clock)

use async_trait::async_trait;
use keel_domain::{
    ConsistencyChecker, DataType, FieldId, FieldProvenance, FieldRegistry, FieldValue, Snapshot,
};
use keel_revalidator::{RevalidationState, Revalidator, RevalidatorConfig, Scheduler};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every call; warns when a value exceeds `limit`
struct RecordingChecker {
    calls: Mutex<Vec<(FieldId, Option<FieldValue>)>>,
    limit: f64,
    fail: Mutex<bool>,
    delay: Duration,
}

impl RecordingChecker {
    fn new(limit: f64) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            limit,
            fail: Mutex::new(false),
            delay: Duration::ZERO,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> Vec<(FieldId, Option<FieldValue>)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, field: &str) -> usize {
        self.calls().iter().filter(|(f, _)| f.as_str() == field).count()
    }

    fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }
}

#[async_trait]
impl ConsistencyChecker for RecordingChecker {
    type Error = String;

    async fn check(
        &self,
        field: &FieldId,
        value: Option<&FieldValue>,
        _record: &Snapshot,
        _existing: Option<&FieldProvenance>,
    ) -> Result<Vec<String>, Self::Error> {
        self.calls
            .lock()
            .unwrap()
            .push((field.clone(), value.cloned()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if *self.fail.lock().unwrap() {
            return Err("provider unavailable".to_string());
        }
        let too_big = value.and_then(FieldValue::as_f64).is_some_and(|n| n > self.limit);
        Ok(if too_big {
            vec![format!("{} too large", field)]
        } else {
            vec![]
        })
    }
}

fn registry() -> Arc<FieldRegistry> {
    Arc::new(
        FieldRegistry::builder()
            .field("loan", DataType::Currency)
            .field("value", DataType::Currency)
            .field("ltv", DataType::Percent)
            .field("notes", DataType::Text)
            .depends("loan", ["ltv"])
            .depends("value", ["ltv", "loan"])
            .depends("ltv", ["loan", "value"])
            .build()
            .unwrap(),
    )
}

fn f(id: &str) -> FieldId {
    FieldId::from(id)
}

fn cur(n: f64) -> Option<FieldValue> {
    Some(FieldValue::Currency(n))
}

fn setup(checker: Arc<RecordingChecker>) -> (Revalidator<RecordingChecker>, Scheduler) {
    let revalidator = Revalidator::new(RevalidatorConfig::default(), registry(), checker);
    (revalidator, Scheduler::new())
}

#[tokio::test(start_paused = true)]
async fn test_debounce_cancellation_runs_one_check() {
    let checker = Arc::new(RecordingChecker::new(1e9));
    let (mut revalidator, mut scheduler) = setup(checker.clone());
    let mut snapshot = Snapshot::new();

    snapshot.record_user_edit(&f("loan"), cur(100.0));
    revalidator.observe(&snapshot, &[f("loan")], &mut scheduler);
    assert_eq!(revalidator.state(&scheduler), RevalidationState::ScheduledSingle);

    tokio::time::sleep(Duration::from_millis(100)).await;
    snapshot.record_user_edit(&f("loan"), cur(200.0));
    revalidator.observe(&snapshot, &[f("loan")], &mut scheduler);

    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;

    let loan_calls: Vec<_> = checker
        .calls()
        .into_iter()
        .filter(|(field, _)| field.as_str() == "loan")
        .collect();
    assert_eq!(loan_calls, vec![(f("loan"), cur(200.0))]);
    assert_eq!(revalidator.metrics().debounces_superseded, 1);
    assert_eq!(revalidator.state(&scheduler), RevalidationState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_dependents_rechecked_in_batch() {
    let checker = Arc::new(RecordingChecker::new(1e9));
    let (mut revalidator, mut scheduler) = setup(checker.clone());
    let mut snapshot = Snapshot::new();
    snapshot.record_user_edit(&f("loan"), cur(100.0));
    snapshot.record_user_edit(&f("ltv"), Some(FieldValue::Percent(50.0)));
    revalidator.prime(&snapshot);

    // value is blank so it is not part of the batch
    snapshot.record_user_edit(&f("loan"), cur(150.0));
    revalidator.observe(&snapshot, &[f("loan")], &mut scheduler);
    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;

    assert_eq!(checker.calls_for("loan"), 1);
    assert_eq!(checker.calls_for("ltv"), 1);
    assert_eq!(checker.calls_for("value"), 0);
    assert_eq!(revalidator.metrics().batches_run, 1);
}

#[tokio::test(start_paused = true)]
async fn test_untracked_edited_field_is_checked() {
    let checker = Arc::new(RecordingChecker::new(1e9));
    let (mut revalidator, mut scheduler) = setup(checker.clone());
    let mut snapshot = Snapshot::new();

    snapshot.record_user_edit(&f("notes"), Some(FieldValue::Text("hello".into())));
    revalidator.observe(&snapshot, &[f("notes")], &mut scheduler);
    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;

    assert_eq!(checker.calls_for("notes"), 1);
    assert_eq!(revalidator.metrics().batches_run, 0);
}

#[tokio::test(start_paused = true)]
async fn test_warnings_applied_and_cleared() {
    let checker = Arc::new(RecordingChecker::new(1000.0));
    let (mut revalidator, mut scheduler) = setup(checker.clone());
    let mut snapshot = Snapshot::new();

    snapshot.record_user_edit(&f("loan"), cur(5000.0));
    revalidator.observe(&snapshot, &[f("loan")], &mut scheduler);
    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;
    assert_eq!(snapshot.warnings(&f("loan")), ["loan too large".to_string()]);

    snapshot.record_user_edit(&f("loan"), cur(10.0));
    revalidator.observe(&snapshot, &[f("loan")], &mut scheduler);
    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;
    assert!(snapshot.warnings(&f("loan")).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_provider_failure_keeps_previous_warnings() {
    let checker = Arc::new(RecordingChecker::new(1000.0));
    let (mut revalidator, mut scheduler) = setup(checker.clone());
    let mut snapshot = Snapshot::new();

    snapshot.record_user_edit(&f("loan"), cur(5000.0));
    revalidator.observe(&snapshot, &[f("loan")], &mut scheduler);
    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;

    checker.set_failing(true);
    snapshot.record_user_edit(&f("loan"), cur(10.0));
    revalidator.observe(&snapshot, &[f("loan")], &mut scheduler);
    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;

    assert_eq!(snapshot.warnings(&f("loan")), ["loan too large".to_string()]);
    assert_eq!(revalidator.metrics().provider_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_result_discarded_after_new_edit() {
    let checker = Arc::new(RecordingChecker::new(1000.0).with_delay(Duration::from_millis(500)));
    let (mut revalidator, mut scheduler) = setup(checker.clone());
    let mut snapshot = Snapshot::new();

    snapshot.record_user_edit(&f("loan"), cur(5000.0));
    revalidator.observe(&snapshot, &[f("loan")], &mut scheduler);

    // Fire the first timer and start its (slow) check
    let key = scheduler.next_fired().await.unwrap();
    assert!(revalidator.fire(&key, &snapshot, &mut scheduler));
    assert_eq!(revalidator.state(&scheduler), RevalidationState::Checking);

    // A newer edit lands while the check is in flight
    snapshot.record_user_edit(&f("loan"), cur(10.0));
    revalidator.observe(&snapshot, &[f("loan")], &mut scheduler);

    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;

    assert!(snapshot.warnings(&f("loan")).is_empty());
    assert_eq!(revalidator.metrics().stale_discarded, 1);
    assert_eq!(checker.calls_for("loan"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_everything() {
    let checker = Arc::new(RecordingChecker::new(1e9).with_delay(Duration::from_millis(500)));
    let (mut revalidator, mut scheduler) = setup(checker.clone());
    let mut snapshot = Snapshot::new();

    snapshot.record_user_edit(&f("loan"), cur(1.0));
    snapshot.record_user_edit(&f("value"), cur(2.0));
    revalidator.observe(&snapshot, &[f("loan"), f("value")], &mut scheduler);

    let key = scheduler.next_fired().await.unwrap();
    revalidator.fire(&key, &snapshot, &mut scheduler);
    tokio::task::yield_now().await;
    revalidator.shutdown(&mut scheduler);

    assert_eq!(scheduler.pending(), 0);
    assert_eq!(revalidator.state(&scheduler), RevalidationState::Idle);

    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(checker.calls().len() <= 1);
    assert_eq!(revalidator.metrics().checks_applied, 0);
    assert!(snapshot.warnings(&f("loan")).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_oversized_batch_checks_every_dependent() {
    let checker = Arc::new(RecordingChecker::new(1e9));
    let config = RevalidatorConfig {
        max_batch_size: 1,
        ..RevalidatorConfig::default()
    };
    let mut revalidator = Revalidator::new(config, registry(), checker.clone());
    let mut scheduler = Scheduler::new();
    let mut snapshot = Snapshot::new();

    snapshot.record_user_edit(&f("loan"), cur(100.0));
    snapshot.record_user_edit(&f("ltv"), Some(FieldValue::Percent(50.0)));
    revalidator.prime(&snapshot);

    snapshot.record_user_edit(&f("value"), cur(200.0));
    revalidator.observe(&snapshot, &[f("value")], &mut scheduler);
    revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;

    assert_eq!(checker.calls_for("value"), 1);
    assert_eq!(checker.calls_for("ltv"), 1);
    assert_eq!(checker.calls_for("loan"), 1);
    assert_eq!(revalidator.metrics().batches_run, 2);
    assert_eq!(revalidator.state(&scheduler), RevalidationState::Idle);
}
