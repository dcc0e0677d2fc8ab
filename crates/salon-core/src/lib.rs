//! salon-core - Core library for the salon back office
//!
//! This crate contains the record models, the remote store boundary (with an
//! in-memory store and the hosted PostgREST/Realtime adapters), and the local
//! mirror that keeps clients, services and appointments synchronized with the
//! remote store for synchronous reads.

pub mod config;
pub mod error;
pub mod mirror;
pub mod models;
pub mod queries;
pub mod state;
pub mod store;
pub mod util;

pub use config::{ApplyPolicy, MirrorConfig, OrphanPolicy, ReconnectConfig, SalonConfig};
pub use error::{Error, Result};
pub use mirror::{Diagnostic, LoadReport, Mirror, Mirrored, Tables, WriteIntent, WriteOutcome};
pub use models::{
    Appointment, AppointmentId, AppointmentPatch, Client, ClientId, ClientPatch, NewAppointment,
    NewClient, NewService, Service, ServiceId, ServicePatch, Table,
};
pub use state::Readiness;
