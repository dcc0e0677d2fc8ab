//! Data models for the salon back office

mod appointment;
mod change;
mod client;
mod id;
mod record;
mod service;
mod table;
pub mod time_of_day;

pub use appointment::{Appointment, AppointmentId, AppointmentPatch, NewAppointment};
pub use change::{ChangeKind, RawChange, RowChange};
pub use client::{Client, ClientId, ClientPatch, NewClient};
pub use record::Record;
pub use service::{NewService, Service, ServiceId, ServicePatch};
pub use table::Table;
