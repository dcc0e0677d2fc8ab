use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use salon_core::config::ConfigError;
use salon_core::store::MemoryStore;
use salon_core::{Client, Mirror, MirrorConfig, NewClient, SalonConfig};

use crate::cli::{Cli, Commands, CompletionShell};
use crate::commands::appointments::{booking_draft, Booking};
use crate::commands::common::{
    appointment_items, demo_store, format_appointment_lines, format_client_lines,
    format_service_lines, normalize_query, open_store, resolve_appointment, resolve_client,
    resolve_service, short_id,
};
use crate::commands::completions::render_completions;
use crate::commands::watch::{format_status, mirror_status};
use crate::error::CliError;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
}

async fn demo_mirror() -> Mirror<MemoryStore> {
    let mirror = Mirror::new(demo_store(today()), MirrorConfig::default());
    let report = mirror.load().await;
    assert!(report.is_complete());
    mirror
}

fn booking(client: &str, service: &str, time: &str) -> Booking {
    Booking {
        client: client.to_string(),
        service: service.to_string(),
        date: today(),
        time: time.to_string(),
        amount: None,
        notes: None,
        paid: false,
    }
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn global_flags_are_accepted_after_the_subcommand() {
    let cli = Cli::try_parse_from(["salon", "day", "2024-03-12", "--json", "--offline"]).unwrap();
    assert!(cli.json);
    assert!(cli.offline);
    assert!(matches!(cli.command, Commands::Day { date: Some(date) } if date == today()));
}

#[test]
fn day_rejects_non_iso_dates() {
    assert!(Cli::try_parse_from(["salon", "day", "12/03/2024"]).is_err());
}

#[test]
fn book_parses_optional_amount() {
    let cli = Cli::try_parse_from([
        "salon", "book", "--client", "anna", "--service", "cut", "--date", "2024-03-12",
        "--time", "16:00", "--amount", "95.50",
    ])
    .unwrap();
    match cli.command {
        Commands::Book { amount, paid, .. } => {
            assert_eq!(amount, Some(Decimal::new(9550, 2)));
            assert!(!paid);
        }
        _ => panic!("expected book command"),
    }
}

#[test]
fn normalize_query_trims_and_rejects_empty() {
    assert_eq!(normalize_query("  anna ").unwrap(), "anna");
    assert!(matches!(normalize_query(" \t "), Err(CliError::EmptyQuery)));
}

#[test]
fn short_id_keeps_first_block() {
    assert_eq!(short_id(&"c1a0f6a4-5a10-4e00-8000-000000000001"), "c1a0f6a4");
}

#[test]
fn completions_name_the_salon_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("salon"));
    assert!(script.contains("add-client"));
}

#[test]
fn open_store_requires_backend_unless_offline() {
    let config = SalonConfig::from_lookup(|_| None).unwrap();
    assert!(open_store(&config, true).is_ok());
    assert!(matches!(
        open_store(&config, false),
        Err(CliError::Config(ConfigError::MissingVar("SUPABASE_URL")))
    ));
}

#[tokio::test]
async fn demo_store_loads_a_usable_day() {
    let mirror = demo_mirror().await;
    let items = appointment_items(&mirror, &mirror.appointments_on_date(today()));
    let lines: Vec<(String, String)> = items
        .iter()
        .map(|item| (item.time.clone(), item.client.clone()))
        .collect();
    assert_eq!(
        lines,
        vec![
            ("09:30".to_string(), "Jan Kowalski".to_string()),
            ("14:00".to_string(), "Anna Nowak".to_string()),
        ]
    );
    assert_eq!(mirror.dates_with_appointments().len(), 3);
}

#[tokio::test]
async fn resolve_client_by_name_or_id_prefix() {
    let mirror = demo_mirror().await;
    assert_eq!(resolve_client(&mirror, "anna").unwrap().name, "Anna Nowak");
    assert_eq!(resolve_client(&mirror, "C2B1").unwrap().name, "Jan Kowalski");
    assert_eq!(resolve_service(&mirror, "cut").unwrap().name, "Haircut");
    assert!(matches!(
        resolve_client(&mirror, "Marta"),
        Err(CliError::ClientNotFound(query)) if query == "Marta"
    ));
}

#[tokio::test]
async fn resolve_client_reports_ambiguous_names() {
    let mirror = demo_mirror().await;
    let error = resolve_client(&mirror, "an").unwrap_err();
    match error {
        CliError::Ambiguous(message) => {
            assert!(message.contains("Anna Nowak"));
            assert!(message.contains("Jan Kowalski"));
        }
        other => panic!("expected ambiguity, got {other}"),
    }
}

#[tokio::test]
async fn resolve_client_prefers_exact_name() {
    let mirror = demo_mirror().await;
    let added: Client = mirror.add_client(NewClient::new("Anna", "700")).await.unwrap();
    assert_eq!(resolve_client(&mirror, "anna").unwrap().id, added.id);
}

#[tokio::test]
async fn resolve_appointment_needs_an_id_prefix() {
    let mirror = demo_mirror().await;
    let visit = resolve_appointment(&mirror, "a300").unwrap();
    assert_eq!(mirror.client_name(visit.client_id), "Anna Nowak");
    assert!(matches!(
        resolve_appointment(&mirror, "anna"),
        Err(CliError::AppointmentNotFound(_))
    ));
}

#[tokio::test]
async fn booking_defaults_amount_to_service_price() {
    let mirror = demo_mirror().await;
    let draft = booking_draft(&mirror, booking("zofia", "colouring", "16:30")).unwrap();
    assert_eq!(draft.amount, Decimal::new(250, 0));
    assert!(!draft.is_paid);

    let appointment = mirror.add_appointment(draft).await.unwrap();
    let day = mirror.appointments_on_date(today());
    assert_eq!(day.last().map(|visit| visit.id), Some(appointment.id));
}

#[tokio::test]
async fn booking_rejects_bad_time() {
    let mirror = demo_mirror().await;
    let result = booking_draft(&mirror, booking("anna", "cut", "half past four"));
    assert!(matches!(result, Err(CliError::InvalidTime(_))));
}

#[tokio::test]
async fn pay_toggles_through_the_mirror() {
    let mirror = demo_mirror().await;
    let visit = resolve_appointment(&mirror, "a200").unwrap();
    assert!(!visit.is_paid);

    let paid = mirror.toggle_paid(visit.id).await.unwrap();
    assert!(paid.is_paid);
    assert!(resolve_appointment(&mirror, "a200").unwrap().is_paid);
}

#[tokio::test]
async fn removed_client_shows_as_unknown_in_history() {
    let mirror = demo_mirror().await;
    let anna = resolve_client(&mirror, "anna").unwrap();
    mirror.remove_client(anna.id).await.unwrap();

    let visits = mirror.history(None, None);
    assert_eq!(visits.len(), 4);
    let lines = format_appointment_lines(&appointment_items(&mirror, &visits), true);
    assert!(lines.iter().any(|line| line.contains("Unknown client")));
}

#[tokio::test]
async fn list_lines_show_short_ids() {
    let mirror = demo_mirror().await;
    let clients = format_client_lines(&mirror.clients_by_name());
    assert_eq!(clients.len(), 3);
    assert!(clients[0].starts_with("c1a0f6a4  Anna Nowak"));
    assert!(clients[0].ends_with("anna@example.com"));

    let services = format_service_lines(&mirror.services_by_name());
    assert!(services[0].contains("Colouring"));
    assert!(services[0].ends_with("250.00"));
}

#[tokio::test]
async fn status_counts_every_table() {
    let mirror = demo_mirror().await;
    let status = mirror_status(&mirror, 7);
    assert_eq!(
        format_status(&status),
        "[7] 3 clients, 3 services, 4 appointments (ready)"
    );
}
