//! Raw input change tracker: watches the keystroke-level text of one field
//! on a shorter quiet period than the lookup pipeline, and reports when the
//! text has settled to empty so the held selection can be dropped.

use crate::form::AirportField;
use crate::pipeline::{quiet_period, ChangeOrigin, QueryChange};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::debug;

/// Report that a field's text settled to empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InputCleared {
    pub field: AirportField,
}

/// Watch one field's text stream until the form shuts down.
///
/// Only typed changes restart the timer; a programmatic set from picking a
/// suggestion is not a keystroke, though it reseats the settled-text
/// memory. When the timer fires, the check runs
/// against the input's text as it is right then, so a pick landing inside
/// the quiet period keeps its selection.
pub(crate) async fn run_clear_tracker(
    field: AirportField,
    debounce: Duration,
    mut queries: watch::Receiver<QueryChange>,
    cleared: mpsc::UnboundedSender<InputCleared>,
) {
    let mut deadline: Option<Instant> = None;
    let mut last_settled: Option<String> = None;

    loop {
        tokio::select! {
            changed = queries.changed() => {
                if changed.is_err() {
                    break;
                }
                let change = queries.borrow_and_update().clone();
                match change.origin {
                    ChangeOrigin::Typed => {
                        deadline = Some(Instant::now() + debounce);
                    }
                    ChangeOrigin::Picked => {
                        // A pick rewrites the text; later settles must diff
                        // against the picked label, or re-emptying the input
                        // after a fresh pick would look like an old settle.
                        last_settled = Some(change.text);
                    }
                }
            }
            _ = quiet_period(deadline) => {
                deadline = None;
                let settled = queries.borrow().text.clone();
                if last_settled.as_deref() == Some(settled.as_str()) {
                    continue;
                }
                let is_empty = settled.is_empty();
                last_settled = Some(settled);
                if is_empty {
                    debug!(field = %field, "input settled empty");
                    if cleared.send(InputCleared { field }).is_err() {
                        break;
                    }
                }
            }
        }
    }
}
