//! Hosted store adapter: PostgREST for rows, Realtime for change feeds.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{RealtimeClient, RemoteStore, StoreError, StoreResult, Subscription};
use crate::models::Table;
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Clone)]
pub struct PostgrestStore {
    rest_url: String,
    anon_key: String,
    access_token: Option<String>,
    client: Client,
    realtime: RealtimeClient,
}

impl fmt::Debug for PostgrestStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PostgrestStore")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl PostgrestStore {
    /// Connect to a project at `url` (e.g. `https://demo.supabase.co`).
    ///
    /// Requests run as the anonymous role unless `access_token` is given.
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        access_token: Option<String>,
    ) -> StoreResult<Self> {
        let base_url = normalize_base_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(StoreError::InvalidConfiguration(
                "Supabase anon key must not be empty".to_string(),
            ));
        }
        let access_token = normalize_text_option(access_token);

        Ok(Self {
            rest_url: format!("{base_url}/rest/v1"),
            realtime: RealtimeClient::new(&base_url, anon_key.clone(), access_token.clone())?,
            anon_key,
            access_token,
            client: Client::builder().build()?,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn row_url(&self, table: Table, id: &str) -> String {
        format!("{}?id=eq.{}", self.table_url(table), id.trim())
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
            .header("Accept", "application/json")
    }

    fn returning(&self, request: RequestBuilder) -> RequestBuilder {
        self.public_request(request)
            .header("Prefer", "return=representation")
    }
}

#[async_trait]
impl RemoteStore for PostgrestStore {
    async fn select_all(&self, table: Table) -> StoreResult<Vec<Value>> {
        let request = self
            .client
            .get(format!("{}?select=*", self.table_url(table)));
        let response = checked(self.public_request(request).send().await?).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn insert(&self, table: Table, payload: Value) -> StoreResult<Value> {
        let request = self
            .client
            .post(self.table_url(table))
            .json(&Value::Array(vec![payload]));
        let response = checked(self.returning(request).send().await?).await?;
        first_row(response.json::<Vec<Value>>().await?, table, "insert")
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> StoreResult<Value> {
        let request = self.client.patch(self.row_url(table, id)).json(&patch);
        let response = checked(self.returning(request).send().await?).await?;
        first_row(response.json::<Vec<Value>>().await?, table, "update")
    }

    async fn delete(&self, table: Table, id: &str) -> StoreResult<()> {
        let request = self.client.delete(self.row_url(table, id));
        checked(self.public_request(request).send().await?).await?;
        Ok(())
    }

    async fn subscribe(&self, table: Table) -> StoreResult<Subscription> {
        self.realtime.subscribe(table).await
    }
}

async fn checked(response: Response) -> StoreResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Api(parse_api_error(status, &body)))
}

fn first_row(rows: Vec<Value>, table: Table, action: &str) -> StoreResult<Value> {
    rows.into_iter().next().ok_or_else(|| {
        StoreError::Api(format!(
            "{action} on {table} returned no row (missing or not visible)"
        ))
    })
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            let detail = payload
                .details
                .or(payload.hint)
                .and_then(|detail| normalize_text_option(Some(detail)));
            return match detail {
                Some(detail) => format!("{} - {} ({})", message.trim(), detail, status.as_u16()),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

/// Trim the project URL and strip any API suffix the caller included.
pub(super) fn normalize_base_url(url: &str) -> StoreResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::InvalidConfiguration(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(StoreError::InvalidConfiguration(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }
    Ok(trimmed.trim_end_matches("/rest/v1").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_strips_rest_suffix() {
        assert_eq!(
            normalize_base_url("https://demo.supabase.co/rest/v1/").unwrap(),
            "https://demo.supabase.co"
        );
        assert_eq!(
            normalize_base_url(" https://demo.supabase.co ").unwrap(),
            "https://demo.supabase.co"
        );
    }

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("demo.supabase.co").is_err());
    }

    #[test]
    fn new_rejects_blank_anon_key() {
        assert!(PostgrestStore::new("https://demo.supabase.co", "  ", None).is_err());
    }

    #[test]
    fn row_url_filters_by_id() {
        let store = PostgrestStore::new("https://demo.supabase.co", "anon", None).unwrap();
        assert_eq!(
            store.row_url(Table::Appointments, "abc"),
            "https://demo.supabase.co/rest/v1/appointments?id=eq.abc"
        );
    }

    #[test]
    fn debug_redacts_keys() {
        let store = PostgrestStore::new(
            "https://demo.supabase.co",
            "anon-secret",
            Some("token-secret".to_string()),
        )
        .unwrap();
        let debug = format!("{store:?}");
        assert!(!debug.contains("anon-secret"));
        assert!(!debug.contains("token-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parse_api_error_prefers_message_and_details() {
        let message = parse_api_error(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value","details":"Key (id) exists."}"#,
        );
        assert_eq!(message, "duplicate key value - Key (id) exists. (409)");
    }

    #[test]
    fn parse_api_error_falls_back_to_status() {
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[test]
    fn first_row_reports_empty_results() {
        let error = first_row(Vec::new(), Table::Clients, "update").unwrap_err();
        assert!(error.to_string().contains("update on clients"));
    }
}
