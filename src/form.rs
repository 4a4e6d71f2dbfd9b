//! Form state: the single source of truth the controller mutates, plus the
//! submit-time validation and request assembly over a state snapshot.

use crate::{Airport, CabinClass, FlightSearchRequest, TripType};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Passenger counts the form offers.
pub const PASSENGER_RANGE: RangeInclusive<u8> = 1..=10;

/// Option list for a passenger-count picker.
pub fn passenger_options() -> Vec<u8> {
    PASSENGER_RANGE.collect()
}

/// The two airport inputs of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AirportField {
    Departure,
    Arrival,
}

impl AirportField {
    /// The opposite input, whose selection feeds this field's exclusion filter.
    pub fn other(&self) -> AirportField {
        match self {
            AirportField::Departure => AirportField::Arrival,
            AirportField::Arrival => AirportField::Departure,
        }
    }
}

impl fmt::Display for AirportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirportField::Departure => f.write_str("departure"),
            AirportField::Arrival => f.write_str("arrival"),
        }
    }
}

/// A submit precondition that did not hold.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("no departure airport selected")]
    MissingDepartureAirport,

    #[error("no arrival airport selected")]
    MissingArrivalAirport,

    #[error("departure and arrival airports are the same")]
    SameAirports,

    #[error("no departure date chosen")]
    MissingDepartureDate,

    #[error("departure date {0} is in the past")]
    DepartureDateInPast(NaiveDate),

    #[error("no return date chosen for a round trip")]
    MissingReturnDate,

    #[error("return date {1} is before departure date {0}")]
    ReturnBeforeDeparture(NaiveDate, NaiveDate),

    #[error("passenger count {0} is outside the offered range")]
    PassengerCountOutOfRange(u8),
}

/// Selectable windows for the two date pickers.
///
/// The return floor tracks the outbound date: picking an outbound day makes
/// it the earliest selectable return day, clearing it drops the floor back
/// to today. Values already picked are never rewritten here; out-of-order
/// dates are caught at submit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
    pub min_departure: NaiveDate,
    pub max_departure: NaiveDate,
    pub min_return: NaiveDate,
    pub max_return: NaiveDate,
}

impl DateBounds {
    /// Initial window: both pickers run from today out to the booking
    /// horizon, capped at the end of the supported calendar.
    pub fn new(today: NaiveDate, horizon_days: u32) -> Self {
        let max = today
            .checked_add_days(Days::new(u64::from(horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        Self {
            min_departure: today,
            max_departure: max,
            min_return: today,
            max_return: max,
        }
    }

    /// Re-anchor the return floor after the outbound date changed.
    /// Returns whether the floor actually moved.
    pub fn on_departure_changed(&mut self, today: NaiveDate, departure: Option<NaiveDate>) -> bool {
        let floor = departure.unwrap_or(today);
        if self.min_return == floor {
            return false;
        }
        self.min_return = floor;
        true
    }
}

/// Complete form state.
///
/// The controller loop is the only writer; everyone else sees snapshots
/// passed by value, so a snapshot can be serialized, diffed, or replayed
/// without racing the live form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    pub departure_query: String,
    pub arrival_query: String,
    pub departure_airport: Option<Airport>,
    pub arrival_airport: Option<Airport>,
    pub departure_suggestions: Vec<Airport>,
    pub arrival_suggestions: Vec<Airport>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub passenger_number: u8,
    pub cabin_class: CabinClass,
    pub trip_type: TripType,
    pub date_bounds: DateBounds,
}

impl FormState {
    /// Fresh form with the defaults the UI opens with.
    pub fn new(today: NaiveDate, horizon_days: u32) -> Self {
        Self {
            departure_query: String::new(),
            arrival_query: String::new(),
            departure_airport: None,
            arrival_airport: None,
            departure_suggestions: Vec::new(),
            arrival_suggestions: Vec::new(),
            departure_date: None,
            return_date: None,
            passenger_number: 1,
            cabin_class: CabinClass::default(),
            trip_type: TripType::default(),
            date_bounds: DateBounds::new(today, horizon_days),
        }
    }

    /// Current text of one airport input.
    pub fn query(&self, field: AirportField) -> &str {
        match field {
            AirportField::Departure => &self.departure_query,
            AirportField::Arrival => &self.arrival_query,
        }
    }

    pub(crate) fn query_mut(&mut self, field: AirportField) -> &mut String {
        match field {
            AirportField::Departure => &mut self.departure_query,
            AirportField::Arrival => &mut self.arrival_query,
        }
    }

    /// Currently held selection of one airport input.
    pub fn selection(&self, field: AirportField) -> Option<&Airport> {
        match field {
            AirportField::Departure => self.departure_airport.as_ref(),
            AirportField::Arrival => self.arrival_airport.as_ref(),
        }
    }

    pub(crate) fn selection_mut(&mut self, field: AirportField) -> &mut Option<Airport> {
        match field {
            AirportField::Departure => &mut self.departure_airport,
            AirportField::Arrival => &mut self.arrival_airport,
        }
    }

    /// Suggestions last produced for one airport input.
    pub fn suggestions(&self, field: AirportField) -> &[Airport] {
        match field {
            AirportField::Departure => &self.departure_suggestions,
            AirportField::Arrival => &self.arrival_suggestions,
        }
    }

    pub(crate) fn suggestions_mut(&mut self, field: AirportField) -> &mut Vec<Airport> {
        match field {
            AirportField::Departure => &mut self.departure_suggestions,
            AirportField::Arrival => &mut self.arrival_suggestions,
        }
    }

    /// Validate every submit precondition and assemble the search request.
    ///
    /// Checks run in the order the form presents its fields; the first
    /// failed precondition is returned. On a one-way trip a leftover return
    /// date is ignored rather than sent.
    pub fn assemble_request(&self, today: NaiveDate) -> Result<FlightSearchRequest, ValidationError> {
        let departing = self
            .departure_airport
            .as_ref()
            .ok_or(ValidationError::MissingDepartureAirport)?;
        let arriving = self
            .arrival_airport
            .as_ref()
            .ok_or(ValidationError::MissingArrivalAirport)?;
        if departing.id == arriving.id {
            return Err(ValidationError::SameAirports);
        }

        let departure_date = self.departure_date.ok_or(ValidationError::MissingDepartureDate)?;
        if departure_date < today {
            return Err(ValidationError::DepartureDateInPast(departure_date));
        }

        let arrival_date = match self.trip_type {
            TripType::RoundTrip => {
                let return_date = self.return_date.ok_or(ValidationError::MissingReturnDate)?;
                if return_date < departure_date {
                    return Err(ValidationError::ReturnBeforeDeparture(departure_date, return_date));
                }
                Some(return_date)
            }
            TripType::OneWay => None,
        };

        if !PASSENGER_RANGE.contains(&self.passenger_number) {
            return Err(ValidationError::PassengerCountOutOfRange(self.passenger_number));
        }

        Ok(FlightSearchRequest {
            departing_id: departing.id.clone(),
            arriving_id: arriving.id.clone(),
            departure_date,
            arrival_date,
            passenger_number: self.passenger_number,
            cabin_class: self.cabin_class,
            trip_type: self.trip_type,
        })
    }

    /// Check the submit preconditions without building the request.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        self.assemble_request(today).map(|_| ())
    }
}
