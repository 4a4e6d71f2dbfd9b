//! Per-field autocomplete pipeline: filters consecutive duplicate queries,
//! waits out the typing quiet period, then runs an airport lookup that
//! supersedes any still in flight. One task per airport field.

use crate::client::{AirportLookup, SearchApiError};
use crate::form::AirportField;
use crate::{Airport, AirportId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// One observed change of an input's text, tagged with how it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueryChange {
    pub text: String,
    pub origin: ChangeOrigin,
}

impl QueryChange {
    pub(crate) fn typed(text: impl Into<String>) -> Self {
        Self { text: text.into(), origin: ChangeOrigin::Typed }
    }

    pub(crate) fn picked(text: impl Into<String>) -> Self {
        Self { text: text.into(), origin: ChangeOrigin::Picked }
    }
}

/// How an input's text came to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeOrigin {
    /// Keystroke-level edit; candidate for a lookup once the quiet period passes.
    Typed,
    /// Set by choosing a suggestion; updates the duplicate filter and cancels
    /// pending work, but never triggers a lookup of its own.
    Picked,
}

/// Terminal report of one lookup cycle, delivered to the controller.
#[derive(Debug)]
pub(crate) struct LookupOutcome {
    pub field: AirportField,
    pub query: String,
    pub result: Result<Vec<Airport>, SearchApiError>,
}

type InflightLookup =
    Pin<Box<dyn Future<Output = (String, Result<Vec<Airport>, SearchApiError>)> + Send>>;

/// Drive one field's query stream until the form shuts down.
///
/// Stage order mirrors the input behavior: duplicate filtering happens on
/// every observed change, the debounce timer restarts on each distinct one,
/// and only the timer firing issues a lookup. The paired field's selection
/// is read at issue time, so the exclusion filter always reflects the
/// moment the request leaves.
pub(crate) async fn run_lookup_pipeline(
    field: AirportField,
    debounce: Duration,
    lookup: Arc<dyn AirportLookup>,
    mut queries: watch::Receiver<QueryChange>,
    paired_selection: watch::Receiver<Option<AirportId>>,
    outcomes: mpsc::UnboundedSender<LookupOutcome>,
) {
    let mut last_seen: Option<String> = None;
    let mut pending: Option<(String, Instant)> = None;
    let mut inflight: Option<InflightLookup> = None;

    loop {
        tokio::select! {
            changed = queries.changed() => {
                if changed.is_err() {
                    break;
                }
                let change = queries.borrow_and_update().clone();
                match change.origin {
                    ChangeOrigin::Typed => {
                        // A consecutive duplicate neither fetches nor restarts the timer.
                        if last_seen.as_deref() == Some(change.text.as_str()) {
                            continue;
                        }
                        last_seen = Some(change.text.clone());
                        pending = Some((change.text, Instant::now() + debounce));
                    }
                    ChangeOrigin::Picked => {
                        last_seen = Some(change.text);
                        pending = None;
                        inflight = None;
                    }
                }
            }
            _ = quiet_period(pending.as_ref().map(|(_, at)| *at)) => {
                if let Some((query, _)) = pending.take() {
                    let exclude = paired_selection.borrow().clone();
                    debug!(field = %field, query = %query, exclude = ?exclude, "issuing airport lookup");
                    let service = Arc::clone(&lookup);
                    inflight = Some(Box::pin(async move {
                        let result = service.search_airports(query.clone(), exclude).await;
                        (query, result)
                    }));
                }
            }
            (query, result) = finished_lookup(&mut inflight) => {
                inflight = None;
                if let Err(ref error) = result {
                    warn!(field = %field, query = %query, error = %error, "airport lookup failed");
                }
                if outcomes.send(LookupOutcome { field, query, result }).is_err() {
                    break;
                }
            }
        }
    }
}

/// Resolves when the debounce deadline passes; never resolves without one.
pub(crate) async fn quiet_period(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Resolves with the in-flight lookup's output; never resolves while idle.
async fn finished_lookup(
    slot: &mut Option<InflightLookup>,
) -> (String, Result<Vec<Airport>, SearchApiError>) {
    match slot.as_mut() {
        Some(lookup) => lookup.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLookup {
        calls: Mutex<Vec<(String, Option<AirportId>)>>,
    }

    impl RecordingLookup {
        fn calls(&self) -> Vec<(String, Option<AirportId>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AirportLookup for RecordingLookup {
        async fn search_airports(
            &self,
            query: String,
            exclude: Option<AirportId>,
        ) -> Result<Vec<Airport>, SearchApiError> {
            self.calls.lock().unwrap().push((query.clone(), exclude));
            if query == "stall" {
                // Simulates a lookup that never answers; only supersession
                // or shutdown gets rid of it.
                std::future::pending::<()>().await;
            }
            if query == "boom" {
                return Err(SearchApiError::Backend("lookup exploded".to_string()));
            }
            Ok(Vec::new())
        }
    }

    struct Harness {
        queries: watch::Sender<QueryChange>,
        selection: watch::Sender<Option<AirportId>>,
        outcomes: mpsc::UnboundedReceiver<LookupOutcome>,
        lookup: Arc<RecordingLookup>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_pipeline() -> Harness {
        let (queries, query_rx) = watch::channel(QueryChange::picked(""));
        let (selection, selection_rx) = watch::channel(None);
        let (outcome_tx, outcomes) = mpsc::unbounded_channel();
        let lookup = Arc::new(RecordingLookup::default());
        let task = tokio::spawn(run_lookup_pipeline(
            AirportField::Departure,
            Duration::from_millis(300),
            lookup.clone(),
            query_rx,
            selection_rx,
            outcome_tx,
        ));
        Harness { queries, selection, outcomes, lookup, task }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_one_lookup() {
        let mut harness = spawn_pipeline();

        for text in ["L", "LO", "LON"] {
            harness.queries.send(QueryChange::typed(text)).unwrap();
            time::sleep(Duration::from_millis(100)).await;
        }

        let outcome = harness.outcomes.recv().await.unwrap();
        assert_eq!(outcome.query, "LON");
        assert_eq!(harness.lookup.calls(), vec![("LON".to_string(), None)]);

        drop(harness.queries);
        harness.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_duplicate_fetches_once() {
        let mut harness = spawn_pipeline();

        harness.queries.send(QueryChange::typed("LON")).unwrap();
        time::sleep(Duration::from_millis(400)).await;
        harness.queries.send(QueryChange::typed("LON")).unwrap();
        time::sleep(Duration::from_millis(400)).await;

        assert_eq!(harness.lookup.calls().len(), 1);

        // A genuinely new value still gets through.
        harness.queries.send(QueryChange::typed("PAR")).unwrap();
        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(harness.lookup.calls().len(), 2);

        let first = harness.outcomes.recv().await.unwrap();
        let second = harness.outcomes.recv().await.unwrap();
        assert_eq!((first.query.as_str(), second.query.as_str()), ("LON", "PAR"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pick_cancels_pending_and_updates_filter() {
        let mut harness = spawn_pipeline();

        harness.queries.send(QueryChange::typed("LON")).unwrap();
        time::sleep(Duration::from_millis(100)).await;
        harness.queries.send(QueryChange::picked("London Heathrow (LHR)")).unwrap();
        time::sleep(Duration::from_secs(2)).await;

        // The pick swallowed the pending lookup and caused none of its own.
        assert!(harness.lookup.calls().is_empty());

        // Retyping the old text differs from the picked label, so it fetches.
        harness.queries.send(QueryChange::typed("LON")).unwrap();
        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(harness.lookup.calls(), vec![("LON".to_string(), None)]);
        assert!(harness.outcomes.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exclusion_read_at_issue_time() {
        let harness = spawn_pipeline();

        harness.selection.send(Some(AirportId::new("apt-cdg"))).unwrap();
        harness.queries.send(QueryChange::typed("LON")).unwrap();
        time::sleep(Duration::from_millis(400)).await;

        harness.selection.send(None).unwrap();
        harness.queries.send(QueryChange::typed("MAD")).unwrap();
        time::sleep(Duration::from_millis(400)).await;

        assert_eq!(
            harness.lookup.calls(),
            vec![
                ("LON".to_string(), Some(AirportId::new("apt-cdg"))),
                ("MAD".to_string(), None),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_lookup_supersedes_stalled_one() {
        let mut harness = spawn_pipeline();

        harness.queries.send(QueryChange::typed("stall")).unwrap();
        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(harness.lookup.calls().len(), 1);

        harness.queries.send(QueryChange::typed("PAR")).unwrap();
        let outcome = harness.outcomes.recv().await.unwrap();
        assert_eq!(outcome.query, "PAR");

        // The stalled lookup was dropped, never reported.
        assert!(harness.outcomes.try_recv().is_err());
        assert_eq!(harness.lookup.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_lookup_keeps_pipeline_alive() {
        let mut harness = spawn_pipeline();

        harness.queries.send(QueryChange::typed("boom")).unwrap();
        let outcome = harness.outcomes.recv().await.unwrap();
        assert!(outcome.result.is_err());

        harness.queries.send(QueryChange::typed("LON")).unwrap();
        let outcome = harness.outcomes.recv().await.unwrap();
        assert_eq!(outcome.query, "LON");
        assert!(outcome.result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_is_a_real_query() {
        let harness = spawn_pipeline();

        harness.queries.send(QueryChange::typed("L")).unwrap();
        time::sleep(Duration::from_millis(400)).await;
        harness.queries.send(QueryChange::typed("")).unwrap();
        time::sleep(Duration::from_millis(400)).await;

        assert_eq!(
            harness.lookup.calls(),
            vec![("L".to_string(), None), ("".to_string(), None)]
        );
    }

    #[test]
    fn test_idle_arms_stay_pending() {
        // With no deadline and no lookup in flight, neither select arm may
        // resolve; the loop must keep blocking on the query stream alone.
        let mut quiet = tokio_test::task::spawn(quiet_period(None));
        tokio_test::assert_pending!(quiet.poll());

        let mut slot = None;
        let mut finished = tokio_test::task::spawn(finished_lookup(&mut slot));
        tokio_test::assert_pending!(finished.poll());
    }
}
