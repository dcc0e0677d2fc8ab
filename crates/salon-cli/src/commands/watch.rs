use salon_core::store::RemoteStore;
use salon_core::{Diagnostic, Mirror, Readiness, Table};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct MirrorStatus {
    pub revision: u64,
    pub readiness: String,
    pub clients: usize,
    pub services: usize,
    pub appointments: usize,
}

#[derive(Debug, Serialize)]
struct DiagnosticItem {
    table: Table,
    message: String,
}

pub fn mirror_status<S: RemoteStore>(mirror: &Mirror<S>, revision: u64) -> MirrorStatus {
    let tables = mirror.tables();
    MirrorStatus {
        revision,
        readiness: mirror.readiness().to_string(),
        clients: tables.clients.len(),
        services: tables.services.len(),
        appointments: tables.appointments.len(),
    }
}

pub fn format_status(status: &MirrorStatus) -> String {
    format!(
        "[{}] {} clients, {} services, {} appointments ({})",
        status.revision, status.clients, status.services, status.appointments, status.readiness
    )
}

fn print_status(status: &MirrorStatus, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string(status)?);
    } else {
        println!("{}", format_status(status));
    }
    Ok(())
}

fn print_diagnostic(diagnostic: &Diagnostic, as_json: bool) -> Result<(), CliError> {
    if as_json {
        let item = DiagnosticItem {
            table: diagnostic.table(),
            message: diagnostic.to_string(),
        };
        println!("{}", serde_json::to_string(&item)?);
    } else {
        eprintln!("! {diagnostic}");
    }
    Ok(())
}

/// Print a status line after every visible change until Ctrl-C.
pub async fn run_watch<S: RemoteStore>(mirror: &Mirror<S>, as_json: bool) -> Result<(), CliError> {
    let mut changes = mirror.subscribe_changes();
    let mut diagnostics = mirror.diagnostics();

    let revision = *changes.borrow_and_update();
    print_status(&mirror_status(mirror, revision), as_json)?;
    if mirror.readiness() == Readiness::Degraded && !as_json {
        eprintln!("! mirror is degraded; some data may be missing or stale");
    }

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let revision = *changes.borrow_and_update();
                print_status(&mirror_status(mirror, revision), as_json)?;
            }
            received = diagnostics.recv() => match received {
                Ok(diagnostic) => print_diagnostic(&diagnostic, as_json)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} diagnostics", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
