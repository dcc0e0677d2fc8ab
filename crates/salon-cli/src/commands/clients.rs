use salon_core::store::RemoteStore;
use salon_core::{Mirror, NewClient};

use crate::commands::common::{
    format_client_lines, normalize_query, print_json, print_lines, resolve_client,
};
use crate::error::CliError;

pub fn run_clients<S: RemoteStore>(
    mirror: &Mirror<S>,
    search: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let mut clients = mirror.clients_by_name();
    if let Some(query) = search {
        let query = normalize_query(query)?;
        let matching = mirror.search_clients(query);
        clients.retain(|client| matching.iter().any(|found| found.id == client.id));
    }

    if as_json {
        print_json(&clients)
    } else {
        print_lines(&format_client_lines(&clients));
        Ok(())
    }
}

pub async fn run_add_client<S: RemoteStore>(
    mirror: &Mirror<S>,
    name: &str,
    phone: &str,
    email: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let mut draft = NewClient::new(name, phone);
    if let Some(email) = email {
        draft = draft.with_email(email);
    }
    let client = mirror.add_client(draft).await?;

    if as_json {
        print_json(&client)
    } else {
        print_lines(&format_client_lines(std::slice::from_ref(&client)));
        Ok(())
    }
}

pub async fn run_remove_client<S: RemoteStore>(
    mirror: &Mirror<S>,
    query: &str,
) -> Result<(), CliError> {
    let client = resolve_client(mirror, query)?;
    let remaining_visits = mirror.appointments_for_client(client.id).len();

    mirror.remove_client(client.id).await?;
    if remaining_visits > 0 && !mirror.appointments_for_client(client.id).is_empty() {
        eprintln!(
            "Note: {remaining_visits} appointment(s) still reference {} and will show as an unknown client",
            client.name
        );
    }
    println!("{}", client.id);
    Ok(())
}
