use chrono::NaiveDate;
use rust_decimal::Decimal;
use salon_core::models::time_of_day::parse_time;
use salon_core::store::RemoteStore;
use salon_core::{Mirror, NewAppointment};

use crate::commands::common::{
    print_appointment, resolve_appointment, resolve_client, resolve_service,
};
use crate::error::CliError;

/// Arguments of `salon book`, as typed on the command line.
#[derive(Debug, Clone)]
pub struct Booking {
    pub client: String,
    pub service: String,
    pub date: NaiveDate,
    pub time: String,
    pub amount: Option<Decimal>,
    pub notes: Option<String>,
    pub paid: bool,
}

/// Turn a booking into an insert payload. The amount defaults to the
/// service's current price.
pub fn booking_draft<S: RemoteStore>(
    mirror: &Mirror<S>,
    booking: Booking,
) -> Result<NewAppointment, CliError> {
    let client = resolve_client(mirror, &booking.client)?;
    let service = resolve_service(mirror, &booking.service)?;
    let time = parse_time(&booking.time).map_err(CliError::InvalidTime)?;

    let mut draft = NewAppointment::new(
        client.id,
        service.id,
        booking.date,
        time,
        booking.amount.unwrap_or(service.price),
    );
    draft.is_paid = booking.paid;
    if let Some(notes) = booking.notes {
        draft = draft.with_notes(notes);
    }
    Ok(draft)
}

pub async fn run_book<S: RemoteStore>(
    mirror: &Mirror<S>,
    booking: Booking,
    as_json: bool,
) -> Result<(), CliError> {
    let draft = booking_draft(mirror, booking)?;
    let appointment = mirror.add_appointment(draft).await?;
    print_appointment(mirror, &appointment, as_json)
}

pub async fn run_pay<S: RemoteStore>(
    mirror: &Mirror<S>,
    query: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let appointment = resolve_appointment(mirror, query)?;
    let updated = mirror.toggle_paid(appointment.id).await?;
    print_appointment(mirror, &updated, as_json)
}

pub async fn run_notes<S: RemoteStore>(
    mirror: &Mirror<S>,
    query: &str,
    text: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let appointment = resolve_appointment(mirror, query)?;
    let updated = mirror
        .update_notes(appointment.id, text.map(str::to_string))
        .await?;
    print_appointment(mirror, &updated, as_json)
}

pub async fn run_remove_appointment<S: RemoteStore>(
    mirror: &Mirror<S>,
    query: &str,
) -> Result<(), CliError> {
    let appointment = resolve_appointment(mirror, query)?;
    mirror.remove_appointment(appointment.id).await?;
    println!("{}", appointment.id);
    Ok(())
}
