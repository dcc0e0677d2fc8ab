//! Appointment model

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::record_id;
use super::{time_of_day, ClientId, Record, ServiceId, Table};
use crate::util::{deserialize_optional_text, normalize_text_option};
use crate::{Error, Result};

record_id!(
    /// Identifier of an appointment row
    AppointmentId
);

/// A booked visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    /// May dangle once the client is deleted
    pub client_id: ClientId,
    /// May dangle once the service is deleted
    pub service_id: ServiceId,
    pub date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
    #[serde(default)]
    pub is_paid: bool,
    /// Amount charged, fixed at booking time
    pub amount: Decimal,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub notes: Option<String>,
}

impl Appointment {
    /// Date and time combined, for chronological ordering.
    #[must_use]
    pub fn starts_at(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.time)
    }
}

/// Insert payload for an appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAppointment {
    pub client_id: ClientId,
    pub service_id: ServiceId,
    pub date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
    pub is_paid: bool,
    pub amount: Decimal,
    pub notes: Option<String>,
}

impl NewAppointment {
    /// Create an unpaid booking without notes.
    #[must_use]
    pub const fn new(
        client_id: ClientId,
        service_id: ServiceId,
        date: NaiveDate,
        time: NaiveTime,
        amount: Decimal,
    ) -> Self {
        Self {
            client_id,
            service_id,
            date,
            time,
            is_paid: false,
            amount,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = normalize_text_option(Some(notes.into()));
        self
    }
}

/// Partial update for an appointment. `notes: Some(None)` clears the notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<ServiceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time_of_day::option"
    )]
    pub time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl AppointmentPatch {
    /// Whole-row update carrying every editable field of `appointment`.
    #[must_use]
    pub fn from_appointment(appointment: &Appointment) -> Self {
        Self {
            client_id: Some(appointment.client_id),
            service_id: Some(appointment.service_id),
            date: Some(appointment.date),
            time: Some(appointment.time),
            is_paid: Some(appointment.is_paid),
            amount: Some(appointment.amount),
            notes: Some(normalize_text_option(appointment.notes.clone())),
        }
    }
}

impl Record for Appointment {
    type Id = AppointmentId;
    type Draft = NewAppointment;
    type Patch = AppointmentPatch;

    const TABLE: Table = Table::Appointments;

    fn id(&self) -> &AppointmentId {
        &self.id
    }

    fn validate_draft(draft: &NewAppointment) -> Result<()> {
        validate_amount(draft.amount)
    }

    fn validate_patch(patch: &AppointmentPatch) -> Result<()> {
        patch.amount.map_or(Ok(()), validate_amount)
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::InvalidInput(format!(
            "appointment amount must not be negative (got {amount})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn date(raw: &str) -> NaiveDate {
        raw.parse().unwrap()
    }

    #[test]
    fn appointment_row_defaults_paid_flag_and_notes() {
        let appointment: Appointment = serde_json::from_value(serde_json::json!({
            "id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b33",
            "created_at": "2024-01-01T00:00:00+00:00",
            "client_id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11",
            "service_id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b22",
            "date": "2024-03-15",
            "time": "09:30:00",
            "amount": 120
        }))
        .unwrap();
        assert!(!appointment.is_paid);
        assert_eq!(appointment.notes, None);
        assert_eq!(appointment.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn blank_notes_column_reads_as_none() {
        let appointment: Appointment = serde_json::from_value(serde_json::json!({
            "id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b33",
            "client_id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11",
            "service_id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b22",
            "date": "2024-03-15",
            "time": "09:30:00",
            "amount": 120,
            "notes": ""
        }))
        .unwrap();
        assert_eq!(appointment.notes, None);
    }

    #[test]
    fn new_appointment_serializes_short_time() {
        let draft = NewAppointment::new(
            ClientId::from_uuid(Uuid::nil()),
            ServiceId::from_uuid(Uuid::nil()),
            date("2024-01-10"),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            Decimal::new(100, 0),
        );
        let payload = serde_json::to_value(&draft).unwrap();
        assert_eq!(payload["time"], "10:00");
        assert_eq!(payload["date"], "2024-01-10");
        assert_eq!(payload["is_paid"], false);
    }

    #[test]
    fn patch_can_clear_notes_and_set_time() {
        let patch = AppointmentPatch {
            time: NaiveTime::from_hms_opt(11, 15, 0),
            notes: Some(None),
            ..AppointmentPatch::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({ "time": "11:15", "notes": null })
        );
    }

    #[test]
    fn validate_draft_rejects_negative_amount() {
        let draft = NewAppointment::new(
            ClientId::from_uuid(Uuid::nil()),
            ServiceId::from_uuid(Uuid::nil()),
            date("2024-01-10"),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            Decimal::new(-5, 0),
        );
        assert!(Appointment::validate_draft(&draft).is_err());
    }
}
