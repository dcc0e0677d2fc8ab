//! Salon CLI - Command-line front end for the salon back office
//!
//! Reads come from a local mirror loaded at startup; writes go to the
//! remote store and are reflected back through the mirror.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use salon_core::store::RemoteStore;
use salon_core::Mirror;

use crate::cli::{Cli, Commands};
use crate::commands::appointments::{
    run_book, run_notes, run_pay, run_remove_appointment, Booking,
};
use crate::commands::clients::{run_add_client, run_clients, run_remove_client};
use crate::commands::common::open_mirror;
use crate::commands::completions::run_completions;
use crate::commands::schedule::{run_dates, run_day, run_history};
use crate::commands::services::{run_add_service, run_remove_service, run_services};
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("salon_cli=info".parse().unwrap())
                .add_directive("salon_core=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        command => {
            let mirror = open_mirror(cli.offline).await?;
            let result = dispatch(&mirror, command, cli.json).await;
            let cancelled = mirror.shutdown().await;
            tracing::debug!("Cancelled {} feed subscription(s)", cancelled);
            result
        }
    }
}

async fn dispatch<S: RemoteStore>(
    mirror: &Mirror<S>,
    command: Commands,
    json: bool,
) -> Result<(), CliError> {
    match command {
        Commands::Clients { search } => run_clients(mirror, search.as_deref(), json)?,
        Commands::Services { search } => run_services(mirror, search.as_deref(), json)?,
        Commands::Day { date } => run_day(mirror, date, json)?,
        Commands::History { client, date } => run_history(mirror, client.as_deref(), date, json)?,
        Commands::Dates => run_dates(mirror, json)?,
        Commands::AddClient { name, phone, email } => {
            run_add_client(mirror, &name, &phone, email.as_deref(), json).await?;
        }
        Commands::AddService {
            name,
            duration,
            price,
        } => run_add_service(mirror, &name, duration, price, json).await?,
        Commands::Book {
            client,
            service,
            date,
            time,
            amount,
            notes,
            paid,
        } => {
            let booking = Booking {
                client,
                service,
                date,
                time,
                amount,
                notes,
                paid,
            };
            run_book(mirror, booking, json).await?;
        }
        Commands::Pay { id } => run_pay(mirror, &id, json).await?,
        Commands::Notes { id, text } => run_notes(mirror, &id, text.as_deref(), json).await?,
        Commands::RemoveClient { client } => run_remove_client(mirror, &client).await?,
        Commands::RemoveService { service } => run_remove_service(mirror, &service).await?,
        Commands::RemoveAppointment { id } => run_remove_appointment(mirror, &id).await?,
        Commands::Watch => run_watch(mirror, json).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
