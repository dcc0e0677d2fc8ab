use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(name = "salon")]
#[command(about = "Manage salon clients, services and appointments")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Work against a seeded in-memory store instead of the hosted backend
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List clients by name
    Clients {
        /// Only show clients whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// List services by name
    Services {
        /// Only show services whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show the appointments of one day
    Day {
        /// Day to show (YYYY-MM-DD, today when omitted)
        date: Option<NaiveDate>,
    },
    /// Show visit history, newest first
    History {
        /// Client ID, ID prefix or name
        #[arg(long)]
        client: Option<String>,
        /// Only visits on this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List days that have appointments
    Dates,
    /// Register a new client
    AddClient {
        /// Full name
        name: String,
        /// Phone number
        phone: String,
        /// Optional email address
        #[arg(long)]
        email: Option<String>,
    },
    /// Add a service to the catalogue
    AddService {
        /// Service name
        name: String,
        /// Duration in minutes
        #[arg(long)]
        duration: u32,
        /// Price
        #[arg(long)]
        price: Decimal,
    },
    /// Book an appointment
    #[command(alias = "new")]
    Book {
        /// Client ID, ID prefix or name
        #[arg(long)]
        client: String,
        /// Service ID, ID prefix or name
        #[arg(long)]
        service: String,
        /// Day of the visit (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Start time (HH:MM)
        #[arg(long)]
        time: String,
        /// Amount to charge (service price when omitted)
        #[arg(long)]
        amount: Option<Decimal>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
        /// Mark the visit as already paid
        #[arg(long)]
        paid: bool,
    },
    /// Toggle the paid flag of an appointment
    Pay {
        /// Appointment ID or unique ID prefix
        id: String,
    },
    /// Replace the notes of an appointment (clears them when omitted)
    Notes {
        /// Appointment ID or unique ID prefix
        id: String,
        /// New notes
        text: Option<String>,
    },
    /// Delete a client (their appointments are kept unless cascading is configured)
    RemoveClient {
        /// Client ID, ID prefix or name
        client: String,
    },
    /// Delete a service
    RemoveService {
        /// Service ID, ID prefix or name
        service: String,
    },
    /// Delete an appointment
    RemoveAppointment {
        /// Appointment ID or unique ID prefix
        id: String,
    },
    /// Follow live changes until interrupted
    Watch,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
