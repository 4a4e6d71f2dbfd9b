//! CLI interface for flight-search-form
//!
//! Drives the headless form engine against a live backend the way a UI
//! would: type a query, pick the first suggestion, fill the trip details,
//! submit.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use flight_search_form::{
    spawn_with_endpoint, Airport, AirportField, CabinClass, FormConfig, FormHandle, FormUpdate,
    TripType,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flight-search-form")]
#[command(about = "Drive the flight-search form engine from the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fill in the form and dispatch a flight search
    Search {
        /// GraphQL endpoint of the flight search backend
        #[arg(long, default_value = "http://localhost:4000/graphql")]
        endpoint: String,
        /// Text typed into the departure airport field
        #[arg(short, long)]
        from: String,
        /// Text typed into the arrival airport field
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Number of passengers (1-10)
        #[arg(long, default_value = "1")]
        passengers: u8,
        /// Cabin class (economy, premium-economy, business, first)
        #[arg(long, default_value = "economy")]
        cabin: String,
        /// Trip type (round-trip, one-way)
        #[arg(long, default_value = "one-way")]
        trip_type: String,
        /// Emit logs as JSON
        #[arg(long)]
        log_json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            endpoint,
            from,
            to,
            date,
            return_date,
            passengers,
            cabin,
            trip_type,
            log_json,
        } => {
            init_logging(log_json);

            let (form, mut updates) = spawn_with_endpoint(&endpoint, FormConfig::default())?;

            // Fill the airport fields the way a user would: the second
            // lookup automatically excludes the first pick.
            let departing = choose_airport(&form, &mut updates, AirportField::Departure, &from).await?;
            println!("Departure: {}", departing.label());
            let arriving = choose_airport(&form, &mut updates, AirportField::Arrival, &to).await?;
            println!("Arrival: {}", arriving.label());

            // A provided return date makes this a round trip
            let trip = if return_date.is_some() {
                TripType::RoundTrip
            } else {
                trip_type.parse::<TripType>()?
            };
            form.set_trip_type(trip)?;

            form.set_departure_date(Some(date.parse::<NaiveDate>()?))?;
            if let Some(ref return_date) = return_date {
                form.set_return_date(Some(return_date.parse::<NaiveDate>()?))?;
            }

            form.set_passenger_count(passengers)?;
            form.set_cabin_class(cabin.parse::<CabinClass>()?)?;

            form.submit()?;
            while let Some(update) = updates.recv().await {
                match update {
                    FormUpdate::Submitted { request } => {
                        println!("{}", serde_json::to_string_pretty(&request)?);
                        println!("Search dispatched.");
                        break;
                    }
                    FormUpdate::SubmitRejected { reason } => {
                        eprintln!("Submit rejected: {}", reason);
                        std::process::exit(1);
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Type a query into one field and take the first suggestion the form offers.
async fn choose_airport(
    form: &FormHandle,
    updates: &mut UnboundedReceiver<FormUpdate>,
    field: AirportField,
    text: &str,
) -> Result<Airport, Box<dyn std::error::Error>> {
    form.edit_query(field, text)?;

    while let Some(update) = updates.recv().await {
        match update {
            FormUpdate::Suggestions { field: got, airports, .. } if got == field => {
                let airport = airports
                    .into_iter()
                    .next()
                    .ok_or_else(|| format!("no airports match {:?}", text))?;
                form.pick_suggestion(field, airport.clone())?;
                return Ok(airport);
            }
            FormUpdate::LookupFailed { field: got, message, .. } if got == field => {
                return Err(format!("airport lookup failed: {}", message).into());
            }
            _ => {}
        }
    }

    Err("form engine stopped before answering".into())
}
