use chrono::{Local, NaiveDate};
use salon_core::store::RemoteStore;
use salon_core::Mirror;

use crate::commands::common::{print_appointments, print_json, resolve_client};
use crate::error::CliError;

pub fn run_day<S: RemoteStore>(
    mirror: &Mirror<S>,
    date: Option<NaiveDate>,
    as_json: bool,
) -> Result<(), CliError> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let appointments = mirror.appointments_on_date(date);

    if !as_json {
        println!("{}", date.format("%A, %Y-%m-%d"));
        if appointments.is_empty() {
            println!("No appointments");
            return Ok(());
        }
    }
    print_appointments(mirror, &appointments, false, as_json)
}

pub fn run_history<S: RemoteStore>(
    mirror: &Mirror<S>,
    client: Option<&str>,
    date: Option<NaiveDate>,
    as_json: bool,
) -> Result<(), CliError> {
    let client_id = client
        .map(|query| resolve_client(mirror, query))
        .transpose()?
        .map(|client| client.id);
    let visits = mirror.history(client_id, date);
    print_appointments(mirror, &visits, true, as_json)
}

pub fn run_dates<S: RemoteStore>(mirror: &Mirror<S>, as_json: bool) -> Result<(), CliError> {
    let dates = mirror.dates_with_appointments();
    if as_json {
        print_json(&dates)
    } else {
        for date in dates {
            println!("{date}");
        }
        Ok(())
    }
}
