pub mod appointments;
pub mod clients;
pub mod common;
pub mod completions;
pub mod schedule;
pub mod services;
pub mod watch;
