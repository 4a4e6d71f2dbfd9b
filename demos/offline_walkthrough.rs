//! Offline walkthrough of the whole form flow
//!
//! Runs against an in-memory airport catalog, so it works without a
//! backend: the debounced lookup, the cross-field exclusion filter, date
//! selection, and a round-trip submit.

use async_trait::async_trait;
use chrono::NaiveDate;
use flight_search_form::{
    Airport, AirportField, AirportId, AirportLookup, FlightDispatch, FlightSearchRequest,
    FormConfig, FormHandle, FormUpdate, SearchApiError, SearchFlightForm,
};
use tokio::sync::mpsc::UnboundedReceiver;

struct CatalogLookup(Vec<Airport>);

#[async_trait]
impl AirportLookup for CatalogLookup {
    async fn search_airports(
        &self,
        query: String,
        exclude: Option<AirportId>,
    ) -> Result<Vec<Airport>, SearchApiError> {
        let needle = query.to_lowercase();
        Ok(self
            .0
            .iter()
            .filter(|airport| airport.label().to_lowercase().contains(&needle))
            .filter(|airport| Some(&airport.id) != exclude.as_ref())
            .cloned()
            .collect())
    }
}

struct PrintingDispatch;

#[async_trait]
impl FlightDispatch for PrintingDispatch {
    async fn send_search(&self, request: FlightSearchRequest) -> Result<(), SearchApiError> {
        println!("📨 Backend received: {}", serde_json::to_string(&request).unwrap());
        Ok(())
    }
}

fn airport(id: &str, name: &str, iata: &str) -> Airport {
    Airport {
        id: AirportId::new(id),
        name: name.to_string(),
        city: name.split_whitespace().next().unwrap_or("").to_string(),
        country: String::new(),
        iata: Some(iata.to_string()),
    }
}

fn catalog() -> Vec<Airport> {
    vec![
        airport("apt-lhr", "London Heathrow", "LHR"),
        airport("apt-lgw", "London Gatwick", "LGW"),
        airport("apt-cdg", "Paris Charles de Gaulle", "CDG"),
        airport("apt-ory", "Paris Orly", "ORY"),
    ]
}

async fn pick_first(
    form: &FormHandle,
    updates: &mut UnboundedReceiver<FormUpdate>,
    field: AirportField,
) -> Airport {
    loop {
        match updates.recv().await.expect("engine stopped") {
            FormUpdate::Suggestions { query, airports, .. } => {
                println!("  \"{}\" matched: {:?}", query, airports.iter().map(Airport::label).collect::<Vec<_>>());
                let first = airports.into_iter().next().expect("catalog returned no match");
                form.pick_suggestion(field, first.clone()).unwrap();
                return first;
            }
            FormUpdate::LookupFailed { message, .. } => panic!("lookup failed: {}", message),
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (form, mut updates) =
        SearchFlightForm::spawn(CatalogLookup(catalog()), PrintingDispatch, FormConfig::default());

    println!("📍 Typing \"lon\" into the departure field as a burst of edits...");
    for text in ["l", "lo", "lon"] {
        form.edit_query(AirportField::Departure, text)?;
    }
    // Only the settled text triggers a lookup.
    let departing = pick_first(&form, &mut updates, AirportField::Departure).await;
    println!("✅ Departure: {}\n", departing.label());

    println!("📍 Typing \"lon\" into the arrival field; the departure pick is excluded...");
    form.edit_query(AirportField::Arrival, "lon")?;
    let arriving = pick_first(&form, &mut updates, AirportField::Arrival).await;
    println!("✅ Arrival: {}\n", arriving.label());

    println!("📅 Filling in the trip details...");
    form.set_departure_date(NaiveDate::from_ymd_opt(2026, 9, 14))?;
    form.set_return_date(NaiveDate::from_ymd_opt(2026, 9, 21))?;
    form.set_passenger_count(2)?;

    form.submit()?;
    while let Some(update) = updates.recv().await {
        match update {
            FormUpdate::Submitted { request } => {
                println!("🚀 Submitted: {} → {}", request.departing_id, request.arriving_id);
                break;
            }
            FormUpdate::SubmitRejected { reason } => {
                println!("⚠️  Rejected: {}", reason);
                break;
            }
            _ => {}
        }
    }

    // Give the fire-and-forget dispatch a beat to print before exiting.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    Ok(())
}
