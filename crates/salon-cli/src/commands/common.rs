use std::fmt::Display;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use salon_core::models::time_of_day::format_time;
use salon_core::models::Record;
use salon_core::queries::{self, search_by_name, Named};
use salon_core::store::{MemoryStore, PostgrestStore, RemoteStore};
use salon_core::{Appointment, Client, Mirror, SalonConfig, Service, Table};
use serde::Serialize;
use serde_json::json;

use crate::error::CliError;

/// Mirror over whichever store the command line selected.
pub type SalonMirror = Mirror<Arc<dyn RemoteStore>>;

const ID_PREFIX_MIN_LEN: usize = 4;
const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Serialize)]
pub struct AppointmentItem {
    pub id: String,
    pub date: NaiveDate,
    pub time: String,
    pub client_id: String,
    pub client: String,
    pub service_id: String,
    pub service: String,
    pub amount: Decimal,
    pub is_paid: bool,
    pub notes: Option<String>,
}

pub async fn open_mirror(offline: bool) -> Result<SalonMirror, CliError> {
    let config = SalonConfig::from_env()?;
    let store = open_store(&config, offline)?;
    let mirror = Mirror::new(store, config.mirror);

    let report = mirror.load().await;
    for (table, message) in &report.failed {
        eprintln!("Warning: {table} could not be loaded: {message}");
    }
    Ok(mirror)
}

pub fn open_store(config: &SalonConfig, offline: bool) -> Result<Arc<dyn RemoteStore>, CliError> {
    if offline {
        tracing::info!("Using the seeded in-memory store");
        return Ok(Arc::new(demo_store(Local::now().date_naive())));
    }

    let backend = config.require_backend()?;
    let store = PostgrestStore::new(
        &backend.supabase_url,
        backend.supabase_anon_key.clone(),
        backend.access_token.clone(),
    )?;
    Ok(Arc::new(store))
}

/// In-memory store with a small salon: three clients, three services and a
/// few visits around `today`.
pub fn demo_store(today: NaiveDate) -> MemoryStore {
    const ANNA: &str = "c1a0f6a4-5a10-4e00-8000-000000000001";
    const JAN: &str = "c2b1e3d4-5a10-4e00-8000-000000000002";
    const ZOFIA: &str = "c3c2a9e7-5a10-4e00-8000-000000000003";
    const HAIRCUT: &str = "d1e4b0c2-5a10-4e00-8000-000000000001";
    const COLOURING: &str = "d2f5c1a3-5a10-4e00-8000-000000000002";
    const MANICURE: &str = "d3a6d2b4-5a10-4e00-8000-000000000003";

    let store = MemoryStore::new();
    let created_at = "2024-01-02T08:00:00+00:00";
    store.seed(
        Table::Clients,
        vec![
            json!({ "id": ANNA, "name": "Anna Nowak", "phone": "600 100 200", "email": "anna@example.com", "created_at": created_at }),
            json!({ "id": JAN, "name": "Jan Kowalski", "phone": "600 300 400", "email": null, "created_at": created_at }),
            json!({ "id": ZOFIA, "name": "Zofia Wójcik", "phone": "600 500 600", "email": null, "created_at": created_at }),
        ],
    );
    store.seed(
        Table::Services,
        vec![
            json!({ "id": HAIRCUT, "name": "Haircut", "duration": 45, "price": 80.0 }),
            json!({ "id": COLOURING, "name": "Colouring", "duration": 120, "price": 250.0 }),
            json!({ "id": MANICURE, "name": "Manicure", "duration": 60, "price": 120.0 }),
        ],
    );

    let visit = |seed: u32, client: &str, service: &str, day: NaiveDate, time: &str, amount: f64, paid: bool| {
        json!({
            "id": format!("a{seed}00f6a4-5a10-4e00-8000-{seed:012}"),
            "client_id": client,
            "service_id": service,
            "date": day.to_string(),
            "time": time,
            "is_paid": paid,
            "amount": amount,
            "notes": null,
            "created_at": created_at,
        })
    };
    let yesterday = today.pred_opt().unwrap_or(today);
    let tomorrow = today.succ_opt().unwrap_or(today);
    store.seed(
        Table::Appointments,
        vec![
            visit(1, ANNA, COLOURING, yesterday, "10:00:00", 250.0, true),
            visit(2, JAN, HAIRCUT, today, "09:30:00", 80.0, false),
            visit(3, ANNA, HAIRCUT, today, "14:00:00", 80.0, false),
            visit(4, ZOFIA, MANICURE, tomorrow, "11:15:00", 120.0, false),
        ],
    );
    store
}

pub fn normalize_query(query: &str) -> Result<&str, CliError> {
    let query = query.trim();
    if query.is_empty() {
        Err(CliError::EmptyQuery)
    } else {
        Ok(query)
    }
}

fn looks_like_id_prefix(query: &str) -> bool {
    query.len() >= ID_PREFIX_MIN_LEN
        && query
            .chars()
            .all(|character| character.is_ascii_hexdigit() || character == '-')
}

fn match_id_prefix<'a, R: Record>(rows: &'a [R], query: &str) -> Vec<&'a R> {
    if !looks_like_id_prefix(query) {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    rows.iter()
        .filter(|row| row.id().to_string().starts_with(&needle))
        .collect()
}

fn pick_one<'a, R: Record>(
    mut matches: Vec<&'a R>,
    query: &str,
    label: fn(&R) -> String,
    not_found: fn(String) -> CliError,
) -> Result<&'a R, CliError> {
    match matches.len() {
        0 => Err(not_found(query.to_string())),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|row| label(row))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::Ambiguous(format!(
                "'{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Find a client or service by full id, id prefix or name.
///
/// A name that matches several rows still resolves when exactly one of them
/// is an exact (case-insensitive) match.
fn resolve_named<R: Record + Named>(
    rows: &[R],
    query: &str,
    not_found: fn(String) -> CliError,
) -> Result<R, CliError> {
    let query = normalize_query(query)?;
    let mut matches = match_id_prefix(rows, query);
    if matches.is_empty() {
        matches = search_by_name(rows, query);
        if matches.len() > 1 {
            let exact: Vec<&R> = matches
                .iter()
                .copied()
                .filter(|row| row.name().eq_ignore_ascii_case(query))
                .collect();
            if exact.len() == 1 {
                matches = exact;
            }
        }
    }
    pick_one(matches, query, |row| row.name().to_string(), not_found).cloned()
}

pub fn resolve_client<S: RemoteStore>(mirror: &Mirror<S>, query: &str) -> Result<Client, CliError> {
    resolve_named(&mirror.snapshot::<Client>(), query, CliError::ClientNotFound)
}

pub fn resolve_service<S: RemoteStore>(
    mirror: &Mirror<S>,
    query: &str,
) -> Result<Service, CliError> {
    resolve_named(&mirror.snapshot::<Service>(), query, CliError::ServiceNotFound)
}

pub fn resolve_appointment<S: RemoteStore>(
    mirror: &Mirror<S>,
    query: &str,
) -> Result<Appointment, CliError> {
    let query = normalize_query(query)?;
    if !looks_like_id_prefix(query) {
        return Err(CliError::AppointmentNotFound(query.to_string()));
    }
    let appointments = mirror.snapshot::<Appointment>();
    let matches = match_id_prefix(&appointments, query);
    pick_one(
        matches,
        query,
        |appointment| short_id(&appointment.id),
        CliError::AppointmentNotFound,
    )
    .cloned()
}

pub fn short_id(id: &impl Display) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_client_lines(clients: &[Client]) -> Vec<String> {
    clients
        .iter()
        .map(|client| {
            let email = client.email.as_deref().unwrap_or("-");
            format!(
                "{}  {:<24}  {:<14}  {email}",
                short_id(&client.id),
                client.name,
                client.phone
            )
        })
        .collect()
}

pub fn format_service_lines(services: &[Service]) -> Vec<String> {
    services
        .iter()
        .map(|service| {
            format!(
                "{}  {:<24}  {:>4} min  {:>9.2}",
                short_id(&service.id),
                service.name,
                service.duration,
                service.price
            )
        })
        .collect()
}

/// Resolve names against one consistent snapshot of the tables.
pub fn appointment_items<S: RemoteStore>(
    mirror: &Mirror<S>,
    appointments: &[Appointment],
) -> Vec<AppointmentItem> {
    let tables = mirror.tables();
    appointments
        .iter()
        .map(|appointment| AppointmentItem {
            id: appointment.id.to_string(),
            date: appointment.date,
            time: format_time(appointment.time),
            client_id: appointment.client_id.to_string(),
            client: queries::client_name(tables.clients.rows(), appointment.client_id),
            service_id: appointment.service_id.to_string(),
            service: queries::service_name(tables.services.rows(), appointment.service_id),
            amount: appointment.amount,
            is_paid: appointment.is_paid,
            notes: appointment.notes.clone(),
        })
        .collect()
}

pub fn format_appointment_lines(items: &[AppointmentItem], with_date: bool) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let when = if with_date {
                format!("{} {:<5}", item.date, item.time)
            } else {
                format!("{:<5}", item.time)
            };
            let paid = if item.is_paid { "paid" } else { "unpaid" };
            let line = format!(
                "{}  {when}  {:<20}  {:<14}  {:>9.2}  {paid}",
                short_id(&item.id),
                item.client,
                item.service,
                item.amount
            );
            match &item.notes {
                Some(notes) => format!("{line}  {notes}"),
                None => line,
            }
        })
        .collect()
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print appointments as a list (with dates) or as a JSON array.
pub fn print_appointments<S: RemoteStore>(
    mirror: &Mirror<S>,
    appointments: &[Appointment],
    with_date: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let items = appointment_items(mirror, appointments);
    if as_json {
        print_json(&items)
    } else {
        print_lines(&format_appointment_lines(&items, with_date));
        Ok(())
    }
}

/// Print the result of a single-appointment write.
pub fn print_appointment<S: RemoteStore>(
    mirror: &Mirror<S>,
    appointment: &Appointment,
    as_json: bool,
) -> Result<(), CliError> {
    let items = appointment_items(mirror, std::slice::from_ref(appointment));
    if as_json {
        match items.first() {
            Some(item) => print_json(item),
            None => Ok(()),
        }
    } else {
        print_lines(&format_appointment_lines(&items, true));
        Ok(())
    }
}
