//! GraphQL-backed client for the airport lookup and flight dispatch boundaries

use crate::{Airport, AirportId, FlightSearchRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// Error types for the search backend boundary
#[derive(Error, Debug)]
pub enum SearchApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("search service answered with status {0}")]
    BadStatus(reqwest::StatusCode),

    #[error("failed to decode search response: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("search service reported: {0}")]
    Backend(String),
}

/// Airport autocomplete boundary: resolve a (possibly empty) query into
/// suggestions, excluding the airport the paired field already holds.
#[async_trait]
pub trait AirportLookup: Send + Sync {
    async fn search_airports(
        &self,
        query: String,
        exclude: Option<AirportId>,
    ) -> Result<Vec<Airport>, SearchApiError>;
}

/// Submit boundary: hand a completed search request to the backend.
#[async_trait]
pub trait FlightDispatch: Send + Sync {
    async fn send_search(&self, request: FlightSearchRequest) -> Result<(), SearchApiError>;
}

const FETCH_AIRPORTS_QUERY: &str = r#"query fetchAirports($airportToSearch: String!, $airportId: String) {
  fetchAirports(airportToSearch: $airportToSearch, airportId: $airportId) {
    AirportID
    name
    city
    country
    IATA
  }
}"#;

const SEND_FLIGHT_INFO_MUTATION: &str = r#"mutation sendFlightInfo($flightInfo: FlightInfoInput!) {
  sendFlightInfo(flightInfo: $flightInfo)
}"#;

/// GraphQL client implementing both backend boundaries of the form.
#[derive(Debug, Clone)]
pub struct SearchApiClient {
    http_client: Client,
    endpoint: String,
}

impl SearchApiClient {
    /// Create a new client for the given GraphQL endpoint.
    pub fn new(endpoint: &str) -> Result<Self, SearchApiError> {
        debug!(endpoint = %endpoint, "creating search API client");
        let http_client = Client::builder()
            .user_agent(concat!("flight-search-form/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http_client, endpoint: endpoint.to_string() })
    }

    /// POST one GraphQL operation and unwrap its `{data, errors}` envelope.
    async fn execute<T: for<'de> Deserialize<'de>>(&self, body: Value) -> Result<T, SearchApiError> {
        let start = std::time::Instant::now();
        let response = self.http_client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        debug!(
            status = %status,
            duration_ms = start.elapsed().as_millis(),
            "GraphQL request completed"
        );

        if !status.is_success() {
            error!(status = %status, "search service answered with an error status");
            return Err(SearchApiError::BadStatus(status));
        }

        let text = response.text().await?;
        let envelope: GraphQlResponse<T> = serde_json::from_str(&text)?;

        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            let message = errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SearchApiError::Backend(message));
        }

        envelope
            .data
            .ok_or_else(|| SearchApiError::Backend("response carried no data".to_string()))
    }
}

#[async_trait]
impl AirportLookup for SearchApiClient {
    #[instrument(level = "debug", skip(self))]
    async fn search_airports(
        &self,
        query: String,
        exclude: Option<AirportId>,
    ) -> Result<Vec<Airport>, SearchApiError> {
        let body = airports_request_body(&query, exclude.as_ref());
        let data: FetchAirportsData = self.execute(body).await?;
        let airports: Vec<Airport> = data.fetch_airports.into_iter().map(Airport::from).collect();
        debug!(query = %query, count = airports.len(), "airport lookup completed");
        Ok(airports)
    }
}

#[async_trait]
impl FlightDispatch for SearchApiClient {
    #[instrument(level = "info", skip(self, request))]
    async fn send_search(&self, request: FlightSearchRequest) -> Result<(), SearchApiError> {
        info!(
            departing = %request.departing_id,
            arriving = %request.arriving_id,
            "sending flight search to backend"
        );
        let body = dispatch_request_body(&request)?;
        // The backend's acknowledgement payload carries nothing the form uses.
        let _: Value = self.execute(body).await?;
        Ok(())
    }
}

/// Build the fetchAirports request body.
///
/// The exclusion variable is left out entirely when there is nothing to
/// exclude; the backend treats a missing variable as "no filter", which is
/// not the same thing as a null id.
fn airports_request_body(query: &str, exclude: Option<&AirportId>) -> Value {
    let mut variables = Map::new();
    variables.insert("airportToSearch".to_string(), Value::String(query.to_string()));
    if let Some(id) = exclude {
        variables.insert("airportId".to_string(), Value::String(id.as_str().to_string()));
    }

    json!({
        "query": FETCH_AIRPORTS_QUERY,
        "variables": Value::Object(variables),
    })
}

/// Build the sendFlightInfo request body around the assembled search request.
fn dispatch_request_body(request: &FlightSearchRequest) -> Result<Value, SearchApiError> {
    Ok(json!({
        "query": SEND_FLIGHT_INFO_MUTATION,
        "variables": { "flightInfo": serde_json::to_value(request)? },
    }))
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct FetchAirportsData {
    #[serde(rename = "fetchAirports")]
    fetch_airports: Vec<AirportDto>,
}

/// Wire shape of an airport row as the backend returns it.
#[derive(Debug, Deserialize)]
struct AirportDto {
    #[serde(rename = "AirportID")]
    airport_id: String,
    name: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
    #[serde(rename = "IATA")]
    iata: Option<String>,
}

impl From<AirportDto> for Airport {
    fn from(dto: AirportDto) -> Self {
        Airport {
            id: AirportId::new(dto.airport_id),
            name: dto.name,
            city: dto.city,
            country: dto.country,
            iata: dto.iata.filter(|code| !code.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CabinClass, TripType};
    use chrono::NaiveDate;

    #[test]
    fn test_client_creation() {
        let client = SearchApiClient::new("http://localhost:4000/graphql");
        assert!(client.is_ok());
    }

    #[test]
    fn test_variables_omit_absent_exclusion() {
        let body = airports_request_body("LON", None);
        let variables = &body["variables"];
        assert_eq!(variables["airportToSearch"], "LON");
        assert!(variables.get("airportId").is_none());
    }

    #[test]
    fn test_variables_carry_exclusion() {
        let exclude = AirportId::new("apt-cdg");
        let body = airports_request_body("LON", Some(&exclude));
        assert_eq!(body["variables"]["airportToSearch"], "LON");
        assert_eq!(body["variables"]["airportId"], "apt-cdg");
    }

    #[test]
    fn test_empty_query_is_sent_as_is() {
        let body = airports_request_body("", None);
        assert_eq!(body["variables"]["airportToSearch"], "");
    }

    #[test]
    fn test_airport_dto_mapping() {
        let dto: AirportDto = serde_json::from_value(json!({
            "AirportID": "apt-lhr",
            "name": "London Heathrow",
            "city": "London",
            "country": "United Kingdom",
            "IATA": "LHR"
        }))
        .unwrap();

        let airport = Airport::from(dto);
        assert_eq!(airport.id, AirportId::new("apt-lhr"));
        assert_eq!(airport.label(), "London Heathrow (LHR)");
    }

    #[test]
    fn test_blank_iata_maps_to_none() {
        let dto: AirportDto = serde_json::from_value(json!({
            "AirportID": "apt-x",
            "name": "Somewhere Regional",
            "IATA": ""
        }))
        .unwrap();

        let airport = Airport::from(dto);
        assert_eq!(airport.iata, None);
        assert_eq!(airport.label(), "Somewhere Regional");
    }

    #[test]
    fn test_envelope_parses_backend_errors() {
        let envelope: GraphQlResponse<Value> =
            serde_json::from_str(r#"{"data": null, "errors": [{"message": "boom"}]}"#).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors.unwrap()[0].message, "boom");
    }

    #[test]
    fn test_dispatch_body_nests_flight_info() {
        let request = FlightSearchRequest {
            departing_id: AirportId::new("apt-1"),
            arriving_id: AirportId::new("apt-2"),
            departure_date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            arrival_date: Some(NaiveDate::from_ymd_opt(2026, 9, 21).unwrap()),
            passenger_number: 2,
            cabin_class: CabinClass::Economy,
            trip_type: TripType::RoundTrip,
        };

        let body = dispatch_request_body(&request).unwrap();
        let info = &body["variables"]["flightInfo"];
        assert_eq!(info["departingId"], "apt-1");
        assert_eq!(info["arrivingId"], "apt-2");
        assert_eq!(info["departureDate"], "2026-09-14");
        assert_eq!(info["tripType"], "ROUND_TRIP");
    }
}
