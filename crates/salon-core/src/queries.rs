//! Read projections the views are built from.
//!
//! Every function is pure over row slices so the same logic serves mirror
//! snapshots and tests.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::{Appointment, Client, ClientId, Service, ServiceId};
use crate::util::squash_whitespace_lowercase;

/// Shown in place of a client name when the reference dangles.
pub const UNKNOWN_CLIENT: &str = "Unknown client";
/// Shown in place of a service name when the reference dangles.
pub const UNKNOWN_SERVICE: &str = "Unknown service";

/// Appointments on `date`, earliest first. Equal times keep collection order.
#[must_use]
pub fn appointments_on_date(appointments: &[Appointment], date: NaiveDate) -> Vec<Appointment> {
    let mut day: Vec<Appointment> = appointments
        .iter()
        .filter(|appointment| appointment.date == date)
        .cloned()
        .collect();
    day.sort_by_key(|appointment| appointment.time);
    day
}

/// Visits of one client, newest first.
#[must_use]
pub fn appointments_for_client(
    appointments: &[Appointment],
    client_id: ClientId,
) -> Vec<Appointment> {
    history(appointments, Some(client_id), None)
}

/// Distinct dates that have at least one appointment.
#[must_use]
pub fn dates_with_appointments(appointments: &[Appointment]) -> BTreeSet<NaiveDate> {
    appointments
        .iter()
        .map(|appointment| appointment.date)
        .collect()
}

/// Visit history, newest first, optionally narrowed to a client and/or a day.
#[must_use]
pub fn history(
    appointments: &[Appointment],
    client_id: Option<ClientId>,
    date: Option<NaiveDate>,
) -> Vec<Appointment> {
    let mut visits: Vec<Appointment> = appointments
        .iter()
        .filter(|appointment| client_id.map_or(true, |id| appointment.client_id == id))
        .filter(|appointment| date.map_or(true, |day| appointment.date == day))
        .cloned()
        .collect();
    visits.sort_by(|left, right| right.starts_at().cmp(&left.starts_at()));
    visits
}

#[must_use]
pub fn client_name(clients: &[Client], id: ClientId) -> String {
    clients
        .iter()
        .find(|client| client.id == id)
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |client| client.name.clone())
}

#[must_use]
pub fn service_name(services: &[Service], id: ServiceId) -> String {
    services
        .iter()
        .find(|service| service.id == id)
        .map_or_else(|| UNKNOWN_SERVICE.to_string(), |service| service.name.clone())
}

/// Rows that carry a display name.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Client {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Service {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Picker search: case- and whitespace-insensitive substring match.
///
/// A blank query matches everything.
#[must_use]
pub fn search_by_name<'a, T: Named>(items: &'a [T], query: &str) -> Vec<&'a T> {
    let needle = squash_whitespace_lowercase(query);
    items
        .iter()
        .filter(|item| needle.is_empty() || squash_whitespace_lowercase(item.name()).contains(&needle))
        .collect()
}

/// Copy of `items` in case-insensitive name order.
#[must_use]
pub fn sorted_by_name<T: Named + Clone>(items: &[T]) -> Vec<T> {
    let mut sorted = items.to_vec();
    sorted.sort_by_cached_key(|item| item.name().to_lowercase());
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::models::AppointmentId;

    fn client(seed: u128, name: &str) -> Client {
        Client {
            id: ClientId::from_uuid(Uuid::from_u128(seed)),
            name: name.to_string(),
            phone: "600".to_string(),
            email: None,
            created_at: Utc::now(),
        }
    }

    fn appointment(seed: u128, client: u128, date: &str, time: &str) -> Appointment {
        Appointment {
            id: AppointmentId::from_uuid(Uuid::from_u128(seed)),
            client_id: ClientId::from_uuid(Uuid::from_u128(client)),
            service_id: ServiceId::from_uuid(Uuid::from_u128(100)),
            date: date.parse().unwrap(),
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            is_paid: false,
            amount: Decimal::new(80, 0),
            notes: None,
        }
    }

    fn times(appointments: &[Appointment]) -> Vec<String> {
        appointments
            .iter()
            .map(|appointment| appointment.time.format("%H:%M").to_string())
            .collect()
    }

    #[test]
    fn day_view_orders_by_time() {
        let rows = vec![
            appointment(1, 1, "2024-01-10", "14:00"),
            appointment(2, 1, "2024-01-10", "09:30"),
            appointment(3, 1, "2024-01-11", "08:00"),
            appointment(4, 1, "2024-01-10", "11:00"),
        ];
        let day = appointments_on_date(&rows, "2024-01-10".parse().unwrap());
        assert_eq!(times(&day), vec!["09:30", "11:00", "14:00"]);
    }

    #[test]
    fn day_view_keeps_collection_order_on_ties() {
        let rows = vec![
            appointment(7, 1, "2024-01-10", "10:00"),
            appointment(3, 2, "2024-01-10", "10:00"),
        ];
        let day = appointments_on_date(&rows, "2024-01-10".parse().unwrap());
        let ids: Vec<u128> = day.iter().map(|row| row.id.as_uuid().as_u128()).collect();
        assert_eq!(ids, vec![7, 3]);
    }

    #[test]
    fn client_history_is_newest_first() {
        let rows = vec![
            appointment(1, 1, "2024-01-10", "09:00"),
            appointment(2, 2, "2024-02-01", "09:00"),
            appointment(3, 1, "2024-03-05", "10:00"),
            appointment(4, 1, "2024-03-05", "16:00"),
        ];
        let visits = appointments_for_client(&rows, ClientId::from_uuid(Uuid::from_u128(1)));
        let ids: Vec<u128> = visits.iter().map(|row| row.id.as_uuid().as_u128()).collect();
        assert_eq!(ids, vec![4, 3, 1]);
    }

    #[test]
    fn history_combines_optional_filters() {
        let rows = vec![
            appointment(1, 1, "2024-01-10", "09:00"),
            appointment(2, 2, "2024-01-10", "10:00"),
            appointment(3, 1, "2024-01-11", "10:00"),
        ];
        let day: NaiveDate = "2024-01-10".parse().unwrap();
        let anna = ClientId::from_uuid(Uuid::from_u128(1));

        assert_eq!(history(&rows, None, None).len(), 3);
        assert_eq!(history(&rows, Some(anna), None).len(), 2);
        assert_eq!(history(&rows, None, Some(day)).len(), 2);
        assert_eq!(history(&rows, Some(anna), Some(day)).len(), 1);
    }

    #[test]
    fn dates_are_distinct_and_sorted() {
        let rows = vec![
            appointment(1, 1, "2024-01-11", "09:00"),
            appointment(2, 1, "2024-01-10", "10:00"),
            appointment(3, 2, "2024-01-11", "10:00"),
        ];
        let dates: Vec<String> = dates_with_appointments(&rows)
            .into_iter()
            .map(|date| date.to_string())
            .collect();
        assert_eq!(dates, vec!["2024-01-10", "2024-01-11"]);
    }

    #[test]
    fn dangling_references_resolve_to_placeholders() {
        let clients = vec![client(1, "Anna")];
        assert_eq!(client_name(&clients, ClientId::from_uuid(Uuid::from_u128(1))), "Anna");
        assert_eq!(
            client_name(&clients, ClientId::from_uuid(Uuid::from_u128(2))),
            UNKNOWN_CLIENT
        );
        assert_eq!(
            service_name(&[], ServiceId::from_uuid(Uuid::from_u128(2))),
            UNKNOWN_SERVICE
        );
    }

    #[test]
    fn search_ignores_case_and_whitespace() {
        let clients = vec![client(1, "Anna Nowak"), client(2, "Jan Kowalski")];
        let found = search_by_name(&clients, " annaNO ");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Anna Nowak");
        assert_eq!(search_by_name(&clients, "   ").len(), 2);
        assert!(search_by_name(&clients, "zofia").is_empty());
    }

    #[test]
    fn sorted_by_name_ignores_case() {
        let clients = vec![client(1, "zofia"), client(2, "Anna"), client(3, "bartek")];
        let names: Vec<String> = sorted_by_name(&clients)
            .into_iter()
            .map(|client| client.name)
            .collect();
        assert_eq!(names, vec!["Anna", "bartek", "zofia"]);
    }
}
