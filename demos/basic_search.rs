//! Basic airport autocomplete example
//!
//! Drives the form engine against a live search backend: type a query,
//! print the suggestions, pick the first one.

use flight_search_form::{spawn_with_endpoint, AirportField, FormConfig, FormUpdate};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (form, mut updates) =
        spawn_with_endpoint("http://localhost:4000/graphql", FormConfig::default())?;

    println!("Searching airports for \"LON\"...");
    form.edit_query(AirportField::Departure, "LON")?;

    while let Some(update) = updates.recv().await {
        match update {
            FormUpdate::Suggestions { query, airports, .. } => {
                println!("✅ {} suggestions for \"{}\"", airports.len(), query);
                for airport in &airports {
                    println!("  - {} [{}]", airport.label(), airport.id);
                }

                match airports.into_iter().next() {
                    Some(first) => {
                        println!("⭐ Picking {}", first.label());
                        form.pick_suggestion(AirportField::Departure, first)?;
                    }
                    None => println!("No matches; try a different query."),
                }
                break;
            }
            FormUpdate::LookupFailed { message, .. } => {
                eprintln!("❌ Airport lookup failed: {}", message);
                eprintln!("This is expected if the flight-search backend isn't running on localhost:4000.");
                eprintln!("The form engine and its update stream are working correctly.");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
