//! The form engine: a single event loop that owns the form state, feeds the
//! per-field pipelines and trackers, and emits updates for the embedder.

use crate::client::{AirportLookup, FlightDispatch};
use crate::form::{AirportField, FormState, ValidationError};
use crate::pipeline::{self, LookupOutcome, QueryChange};
use crate::tracker::{self, InputCleared};
use crate::{Airport, AirportId, CabinClass, DateBounds, FlightSearchRequest, FormError, TripType};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Tuning knobs for the form engine.
#[derive(Debug, Clone)]
pub struct FormConfig {
    /// Quiet period a typed query must survive before a lookup is issued.
    pub query_debounce: Duration,
    /// Quiet period before emptied input text clears a held selection.
    pub clear_debounce: Duration,
    /// How far past today the date pickers reach.
    pub booking_horizon_days: u32,
    /// Fixed "today" for date bounds and validation; `None` uses the wall clock.
    pub today: Option<NaiveDate>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            query_debounce: Duration::from_millis(300),
            clear_debounce: Duration::from_millis(150),
            booking_horizon_days: 330,
            today: None,
        }
    }
}

impl FormConfig {
    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Input events from the embedding UI.
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    /// Keystroke-level change of an airport input's text.
    QueryEdited { field: AirportField, text: String },
    /// A suggestion was chosen for a field.
    SuggestionPicked { field: AirportField, airport: Airport },
    DepartureDateChanged(Option<NaiveDate>),
    ReturnDateChanged(Option<NaiveDate>),
    PassengerCountChanged(u8),
    CabinClassChanged(CabinClass),
    TripTypeChanged(TripType),
    /// Validate the current state and dispatch the search request.
    SubmitRequested,
    /// Ask for a snapshot of the full form state.
    StateRequested,
}

/// Observable updates the engine emits for the embedder to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "update")]
pub enum FormUpdate {
    /// Fresh suggestions for one field's settled query.
    Suggestions { field: AirportField, query: String, airports: Vec<Airport> },
    /// A lookup failed; the field's suggestions were cleared.
    LookupFailed { field: AirportField, query: String, message: String },
    /// A pick took hold.
    SelectionSet { field: AirportField, airport: Airport },
    /// Emptied input released the field's selection.
    SelectionCleared { field: AirportField },
    /// The return picker's window moved after an outbound date change.
    ReturnDateBoundsChanged { bounds: DateBounds },
    /// A valid submission left for the backend.
    Submitted { request: FlightSearchRequest },
    /// Submit was refused; nothing was sent.
    SubmitRejected { reason: ValidationError },
    /// Snapshot answering [`FormEvent::StateRequested`].
    State { state: FormState },
}

/// Cloneable handle for feeding events into the engine.
///
/// The engine shuts down once every handle is dropped.
#[derive(Debug, Clone)]
pub struct FormHandle {
    events: mpsc::UnboundedSender<FormEvent>,
}

impl FormHandle {
    /// Send a raw event to the engine.
    pub fn send(&self, event: FormEvent) -> Result<(), FormError> {
        self.events.send(event).map_err(|_| FormError::EngineStopped)
    }

    /// Report a keystroke-level edit of one airport input.
    pub fn edit_query(&self, field: AirportField, text: impl Into<String>) -> Result<(), FormError> {
        self.send(FormEvent::QueryEdited { field, text: text.into() })
    }

    /// Choose a suggestion for one airport input.
    pub fn pick_suggestion(&self, field: AirportField, airport: Airport) -> Result<(), FormError> {
        self.send(FormEvent::SuggestionPicked { field, airport })
    }

    pub fn set_departure_date(&self, date: Option<NaiveDate>) -> Result<(), FormError> {
        self.send(FormEvent::DepartureDateChanged(date))
    }

    pub fn set_return_date(&self, date: Option<NaiveDate>) -> Result<(), FormError> {
        self.send(FormEvent::ReturnDateChanged(date))
    }

    pub fn set_passenger_count(&self, count: u8) -> Result<(), FormError> {
        self.send(FormEvent::PassengerCountChanged(count))
    }

    pub fn set_cabin_class(&self, cabin: CabinClass) -> Result<(), FormError> {
        self.send(FormEvent::CabinClassChanged(cabin))
    }

    pub fn set_trip_type(&self, trip: TripType) -> Result<(), FormError> {
        self.send(FormEvent::TripTypeChanged(trip))
    }

    /// Validate the form and dispatch the search request if it holds up.
    pub fn submit(&self) -> Result<(), FormError> {
        self.send(FormEvent::SubmitRequested)
    }

    /// Ask for a [`FormUpdate::State`] snapshot.
    pub fn request_state(&self) -> Result<(), FormError> {
        self.send(FormEvent::StateRequested)
    }
}

struct PerField<T> {
    departure: T,
    arrival: T,
}

impl<T> PerField<T> {
    fn get(&self, field: AirportField) -> &T {
        match field {
            AirportField::Departure => &self.departure,
            AirportField::Arrival => &self.arrival,
        }
    }
}

/// The form engine. Owns the state and every internal channel; state is
/// mutated nowhere else.
pub struct SearchFlightForm {
    config: FormConfig,
    state: FormState,
    dispatch: Arc<dyn FlightDispatch>,
    events: mpsc::UnboundedReceiver<FormEvent>,
    updates: mpsc::UnboundedSender<FormUpdate>,
    outcomes: mpsc::UnboundedReceiver<LookupOutcome>,
    cleared: mpsc::UnboundedReceiver<InputCleared>,
    queries: PerField<watch::Sender<QueryChange>>,
    selections: PerField<watch::Sender<Option<AirportId>>>,
}

impl SearchFlightForm {
    /// Wire up the engine and its four pipeline tasks, returning the
    /// embedder's handle and the update stream.
    pub fn spawn<L, D>(
        lookup: L,
        dispatch: D,
        config: FormConfig,
    ) -> (FormHandle, mpsc::UnboundedReceiver<FormUpdate>)
    where
        L: AirportLookup + 'static,
        D: FlightDispatch + 'static,
    {
        let lookup: Arc<dyn AirportLookup> = Arc::new(lookup);
        let dispatch: Arc<dyn FlightDispatch> = Arc::new(dispatch);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (cleared_tx, cleared_rx) = mpsc::unbounded_channel();

        let (departure_query_tx, departure_query_rx) = watch::channel(QueryChange::picked(""));
        let (arrival_query_tx, arrival_query_rx) = watch::channel(QueryChange::picked(""));
        let (departure_selection_tx, departure_selection_rx) = watch::channel(None);
        let (arrival_selection_tx, arrival_selection_rx) = watch::channel(None);

        // Each field's pipeline reads the paired field's selection for its
        // exclusion filter.
        tokio::spawn(pipeline::run_lookup_pipeline(
            AirportField::Departure,
            config.query_debounce,
            Arc::clone(&lookup),
            departure_query_rx.clone(),
            arrival_selection_rx,
            outcome_tx.clone(),
        ));
        tokio::spawn(pipeline::run_lookup_pipeline(
            AirportField::Arrival,
            config.query_debounce,
            Arc::clone(&lookup),
            arrival_query_rx.clone(),
            departure_selection_rx,
            outcome_tx,
        ));
        tokio::spawn(tracker::run_clear_tracker(
            AirportField::Departure,
            config.clear_debounce,
            departure_query_rx,
            cleared_tx.clone(),
        ));
        tokio::spawn(tracker::run_clear_tracker(
            AirportField::Arrival,
            config.clear_debounce,
            arrival_query_rx,
            cleared_tx,
        ));

        let engine = SearchFlightForm {
            state: FormState::new(config.today(), config.booking_horizon_days),
            config,
            dispatch,
            events: event_rx,
            updates: update_tx,
            outcomes: outcome_rx,
            cleared: cleared_rx,
            queries: PerField { departure: departure_query_tx, arrival: arrival_query_tx },
            selections: PerField { departure: departure_selection_tx, arrival: arrival_selection_tx },
        };
        tokio::spawn(engine.run());

        (FormHandle { events: event_tx }, update_rx)
    }

    async fn run(mut self) {
        info!("flight search form engine started");
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
                Some(outcome) = self.outcomes.recv() => {
                    self.handle_lookup_outcome(outcome);
                }
                Some(cleared) = self.cleared.recv() => {
                    self.handle_input_cleared(cleared);
                }
            }
        }
        info!("flight search form engine stopped");
    }

    fn handle_event(&mut self, event: FormEvent) {
        match event {
            FormEvent::QueryEdited { field, text } => {
                debug!(field = %field, text = %text, "query edited");
                *self.state.query_mut(field) = text.clone();
                // Both cadences watch the same stream; latest value wins.
                let _ = self.queries.get(field).send(QueryChange::typed(text));
            }
            FormEvent::SuggestionPicked { field, airport } => self.apply_pick(field, airport),
            FormEvent::DepartureDateChanged(date) => {
                self.state.departure_date = date;
                let today = self.config.today();
                if self.state.date_bounds.on_departure_changed(today, date) {
                    self.emit(FormUpdate::ReturnDateBoundsChanged {
                        bounds: self.state.date_bounds.clone(),
                    });
                }
            }
            FormEvent::ReturnDateChanged(date) => {
                self.state.return_date = date;
            }
            FormEvent::PassengerCountChanged(count) => {
                self.state.passenger_number = count;
            }
            FormEvent::CabinClassChanged(cabin) => {
                self.state.cabin_class = cabin;
            }
            FormEvent::TripTypeChanged(trip) => {
                self.state.trip_type = trip;
            }
            FormEvent::SubmitRequested => self.submit(),
            FormEvent::StateRequested => self.emit(FormUpdate::State { state: self.state.clone() }),
        }
    }

    fn apply_pick(&mut self, field: AirportField, airport: Airport) {
        info!(field = %field, airport = %airport.id, "suggestion picked");
        let label = airport.label();
        *self.state.query_mut(field) = label.clone();
        *self.state.selection_mut(field) = Some(airport.clone());
        self.state.suggestions_mut(field).clear();
        let _ = self.queries.get(field).send(QueryChange::picked(label));
        let _ = self.selections.get(field).send(Some(airport.id.clone()));
        self.emit(FormUpdate::SelectionSet { field, airport });
    }

    fn handle_lookup_outcome(&mut self, outcome: LookupOutcome) {
        let LookupOutcome { field, query, result } = outcome;
        match result {
            Ok(airports) => {
                debug!(field = %field, query = %query, count = airports.len(), "suggestions updated");
                *self.state.suggestions_mut(field) = airports.clone();
                self.emit(FormUpdate::Suggestions { field, query, airports });
            }
            Err(error) => {
                // Non-fatal: drop stale suggestions and report; the next
                // keystroke starts a fresh cycle.
                self.state.suggestions_mut(field).clear();
                self.emit(FormUpdate::LookupFailed { field, query, message: error.to_string() });
            }
        }
    }

    fn handle_input_cleared(&mut self, cleared: InputCleared) {
        let field = cleared.field;
        // The tracker saw settled-empty text; re-check against the state in
        // case a newer edit landed since.
        if !self.state.query(field).is_empty() {
            return;
        }
        if self.state.selection_mut(field).take().is_some() {
            info!(field = %field, "input emptied, selection cleared");
            let _ = self.selections.get(field).send(None);
            self.emit(FormUpdate::SelectionCleared { field });
        }
    }

    fn submit(&mut self) {
        let today = self.config.today();
        match self.state.assemble_request(today) {
            Ok(request) => {
                info!(
                    departing = %request.departing_id,
                    arriving = %request.arriving_id,
                    departure_date = %request.departure_date,
                    "dispatching flight search"
                );
                let dispatch = Arc::clone(&self.dispatch);
                let outbound = request.clone();
                // Fire and forget: the form never waits on the backend.
                tokio::spawn(async move {
                    if let Err(error) = dispatch.send_search(outbound).await {
                        warn!(error = %error, "flight search dispatch failed");
                    }
                });
                self.emit(FormUpdate::Submitted { request });
            }
            Err(reason) => {
                warn!(reason = %reason, "submit rejected");
                self.emit(FormUpdate::SubmitRejected { reason });
            }
        }
    }

    fn emit(&self, update: FormUpdate) {
        // The embedder may have dropped the update stream; the engine keeps
        // serving the remaining handles either way.
        let _ = self.updates.send(update);
    }
}
