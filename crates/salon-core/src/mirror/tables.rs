//! The three mirrored collections and the per-type access used by the mirror.

use super::collection::Collection;
use crate::models::{Appointment, AppointmentId, Client, ClientId, Record, Service, ServiceId};

/// A consistent view of all mirrored tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub clients: Collection<Client>,
    pub services: Collection<Service>,
    pub appointments: Collection<Appointment>,
}

/// A record type the mirror keeps a collection of.
pub trait Mirrored: Record {
    fn collection(tables: &Tables) -> &Collection<Self>;

    fn collection_mut(tables: &mut Tables) -> &mut Collection<Self>;

    /// Drop appointments that referenced a deleted row. Returns their ids.
    fn cascade_delete(_tables: &mut Tables, _id: &Self::Id) -> Vec<AppointmentId> {
        Vec::new()
    }
}

impl Mirrored for Client {
    fn collection(tables: &Tables) -> &Collection<Self> {
        &tables.clients
    }

    fn collection_mut(tables: &mut Tables) -> &mut Collection<Self> {
        &mut tables.clients
    }

    fn cascade_delete(tables: &mut Tables, id: &ClientId) -> Vec<AppointmentId> {
        tables
            .appointments
            .remove_where(|appointment| appointment.client_id == *id)
            .into_iter()
            .map(|appointment| appointment.id)
            .collect()
    }
}

impl Mirrored for Service {
    fn collection(tables: &Tables) -> &Collection<Self> {
        &tables.services
    }

    fn collection_mut(tables: &mut Tables) -> &mut Collection<Self> {
        &mut tables.services
    }

    fn cascade_delete(tables: &mut Tables, id: &ServiceId) -> Vec<AppointmentId> {
        tables
            .appointments
            .remove_where(|appointment| appointment.service_id == *id)
            .into_iter()
            .map(|appointment| appointment.id)
            .collect()
    }
}

impl Mirrored for Appointment {
    fn collection(tables: &Tables) -> &Collection<Self> {
        &tables.appointments
    }

    fn collection_mut(tables: &mut Tables) -> &mut Collection<Self> {
        &mut tables.appointments
    }
}
