//! # Flight Search Form
//!
//! A headless engine for a flight-search form: two mutually-filtering
//! airport autocomplete fields, trip parameters, and a submit pipeline that
//! assembles and dispatches a search request. The engine owns the form
//! state and the debounce/supersession plumbing; embedders feed it input
//! events and render the update stream however they like.

pub mod client;
pub mod controller;
pub mod form;
mod pipeline;
mod tracker;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Re-export main types for convenience
pub use client::{AirportLookup, FlightDispatch, SearchApiClient, SearchApiError};
pub use controller::{FormConfig, FormEvent, FormHandle, FormUpdate, SearchFlightForm};
pub use form::{AirportField, DateBounds, FormState, ValidationError};

/// Error types for the form engine
#[derive(Error, Debug)]
pub enum FormError {
    #[error("search API request failed: {0}")]
    SearchApiError(#[from] SearchApiError),

    #[error("form is not ready to submit: {0}")]
    ValidationFailed(#[from] form::ValidationError),

    #[error("value parsing failed: {0}")]
    ParseError(String),

    #[error("form engine has shut down")]
    EngineStopped,
}

/// Opaque identifier the backend uses for an airport.
///
/// The engine never inspects it; it only threads the paired field's id
/// through as the exclusion filter and copies both ids into the final
/// search request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AirportId(String);

impl AirportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AirportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An airport suggestion as surfaced to the embedder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub id: AirportId,
    pub name: String,
    pub city: String,
    pub country: String,
    pub iata: Option<String>,
}

impl Airport {
    /// Text placed into the input field when this airport is chosen.
    pub fn label(&self) -> String {
        match &self.iata {
            Some(code) => format!("{} ({})", self.name, code),
            None => self.name.clone(),
        }
    }
}

/// Cabin class enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    /// All cabin classes the form offers, in display order.
    pub const ALL: [CabinClass; 4] = [
        CabinClass::Economy,
        CabinClass::PremiumEconomy,
        CabinClass::Business,
        CabinClass::First,
    ];
}

impl Default for CabinClass {
    fn default() -> Self {
        CabinClass::Economy
    }
}

impl FromStr for CabinClass {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "economy" => Ok(CabinClass::Economy),
            "premium-economy" | "premium_economy" => Ok(CabinClass::PremiumEconomy),
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            _ => Err(FormError::ParseError(format!("Invalid cabin class: {}", s))),
        }
    }
}

/// Trip type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripType {
    RoundTrip,
    OneWay,
}

impl TripType {
    /// All trip types the form offers, in display order.
    pub const ALL: [TripType; 2] = [TripType::RoundTrip, TripType::OneWay];
}

impl Default for TripType {
    fn default() -> Self {
        TripType::RoundTrip
    }
}

impl FromStr for TripType {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "round-trip" | "roundtrip" => Ok(TripType::RoundTrip),
            "one-way" | "oneway" => Ok(TripType::OneWay),
            _ => Err(FormError::ParseError(format!("Invalid trip type: {}", s))),
        }
    }
}

/// The payload assembled at submit time and handed to the dispatch boundary.
///
/// Field names follow the backend's `FlightInfo` contract; a one-way trip
/// omits `arrivalDate` entirely rather than sending a null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearchRequest {
    pub departing_id: AirportId,
    pub arriving_id: AirportId,
    pub departure_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_date: Option<NaiveDate>,
    pub passenger_number: u8,
    pub cabin_class: CabinClass,
    pub trip_type: TripType,
}

/// Spawn a form engine wired to the GraphQL-backed search client.
///
/// Convenience entry point for embedders that talk to the real backend;
/// use [`SearchFlightForm::spawn`] directly to supply custom boundary
/// implementations.
///
/// # Example
/// ```no_run
/// use flight_search_form::{spawn_with_endpoint, AirportField, FormConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (form, mut updates) = spawn_with_endpoint("https://api.example.com/graphql", FormConfig::default())?;
///
/// form.edit_query(AirportField::Departure, "LON")?;
/// while let Some(update) = updates.recv().await {
///     println!("{:?}", update);
/// }
/// # Ok(())
/// # }
/// ```
pub fn spawn_with_endpoint(
    endpoint: &str,
    config: FormConfig,
) -> Result<(FormHandle, tokio::sync::mpsc::UnboundedReceiver<FormUpdate>), FormError> {
    let client = SearchApiClient::new(endpoint)?;
    Ok(SearchFlightForm::spawn(client.clone(), client, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_type_parsing() {
        assert!(matches!("round-trip".parse::<TripType>(), Ok(TripType::RoundTrip)));
        assert!(matches!("roundtrip".parse::<TripType>(), Ok(TripType::RoundTrip)));
        assert!(matches!("one-way".parse::<TripType>(), Ok(TripType::OneWay)));
        assert!("multi-city".parse::<TripType>().is_err());
        assert!("invalid".parse::<TripType>().is_err());
    }

    #[test]
    fn test_cabin_class_parsing() {
        assert!(matches!("economy".parse::<CabinClass>(), Ok(CabinClass::Economy)));
        assert!(matches!("premium-economy".parse::<CabinClass>(), Ok(CabinClass::PremiumEconomy)));
        assert!(matches!("business".parse::<CabinClass>(), Ok(CabinClass::Business)));
        assert!(matches!("first".parse::<CabinClass>(), Ok(CabinClass::First)));
        assert!("invalid".parse::<CabinClass>().is_err());
    }

    #[test]
    fn test_option_lists_match_the_form_choices() {
        assert_eq!(
            CabinClass::ALL,
            [
                CabinClass::Economy,
                CabinClass::PremiumEconomy,
                CabinClass::Business,
                CabinClass::First,
            ]
        );
        assert_eq!(TripType::ALL, [TripType::RoundTrip, TripType::OneWay]);

        // The form opens on the first entry of each list.
        assert_eq!(CabinClass::ALL[0], CabinClass::default());
        assert_eq!(TripType::ALL[0], TripType::default());
    }

    #[test]
    fn test_wire_enum_casing() {
        assert_eq!(serde_json::to_string(&TripType::RoundTrip).unwrap(), "\"ROUND_TRIP\"");
        assert_eq!(serde_json::to_string(&TripType::OneWay).unwrap(), "\"ONE_WAY\"");
        assert_eq!(serde_json::to_string(&CabinClass::Economy).unwrap(), "\"ECONOMY\"");
        assert_eq!(
            serde_json::to_string(&CabinClass::PremiumEconomy).unwrap(),
            "\"PREMIUM_ECONOMY\""
        );
    }

    #[test]
    fn test_airport_label() {
        let heathrow = Airport {
            id: AirportId::new("apt-lhr"),
            name: "London Heathrow".to_string(),
            city: "London".to_string(),
            country: "United Kingdom".to_string(),
            iata: Some("LHR".to_string()),
        };
        assert_eq!(heathrow.label(), "London Heathrow (LHR)");

        let no_code = Airport { iata: None, ..heathrow };
        assert_eq!(no_code.label(), "London Heathrow");
    }

    #[test]
    fn test_search_request_wire_names() {
        let request = FlightSearchRequest {
            departing_id: AirportId::new("apt-1"),
            arriving_id: AirportId::new("apt-2"),
            departure_date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            arrival_date: Some(NaiveDate::from_ymd_opt(2026, 9, 21).unwrap()),
            passenger_number: 2,
            cabin_class: CabinClass::Business,
            trip_type: TripType::RoundTrip,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["departingId"], "apt-1");
        assert_eq!(json["arrivingId"], "apt-2");
        assert_eq!(json["departureDate"], "2026-09-14");
        assert_eq!(json["arrivalDate"], "2026-09-21");
        assert_eq!(json["passengerNumber"], 2);
        assert_eq!(json["cabinClass"], "BUSINESS");
        assert_eq!(json["tripType"], "ROUND_TRIP");
    }

    #[test]
    fn test_one_way_request_omits_arrival_date() {
        let request = FlightSearchRequest {
            departing_id: AirportId::new("apt-1"),
            arriving_id: AirportId::new("apt-2"),
            departure_date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            arrival_date: None,
            passenger_number: 1,
            cabin_class: CabinClass::Economy,
            trip_type: TripType::OneWay,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("arrivalDate").is_none());
        assert_eq!(json["tripType"], "ONE_WAY");
    }
}
