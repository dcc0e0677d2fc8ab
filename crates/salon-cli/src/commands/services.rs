use rust_decimal::Decimal;
use salon_core::store::RemoteStore;
use salon_core::{Mirror, NewService};

use crate::commands::common::{
    format_service_lines, normalize_query, print_json, print_lines, resolve_service,
};
use crate::error::CliError;

pub fn run_services<S: RemoteStore>(
    mirror: &Mirror<S>,
    search: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let mut services = mirror.services_by_name();
    if let Some(query) = search {
        let query = normalize_query(query)?;
        let matching = mirror.search_services(query);
        services.retain(|service| matching.iter().any(|found| found.id == service.id));
    }

    if as_json {
        print_json(&services)
    } else {
        print_lines(&format_service_lines(&services));
        Ok(())
    }
}

pub async fn run_add_service<S: RemoteStore>(
    mirror: &Mirror<S>,
    name: &str,
    duration: u32,
    price: Decimal,
    as_json: bool,
) -> Result<(), CliError> {
    let service = mirror
        .add_service(NewService::new(name, duration, price))
        .await?;

    if as_json {
        print_json(&service)
    } else {
        print_lines(&format_service_lines(std::slice::from_ref(&service)));
        Ok(())
    }
}

pub async fn run_remove_service<S: RemoteStore>(
    mirror: &Mirror<S>,
    query: &str,
) -> Result<(), CliError> {
    let service = resolve_service(mirror, query)?;
    mirror.remove_service(service.id).await?;
    println!("{}", service.id);
    Ok(())
}
