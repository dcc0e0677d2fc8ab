//! Client model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::record_id;
use super::{Record, Table};
use crate::util::{deserialize_optional_text, normalize_text_option};
use crate::{Error, Result};

record_id!(
    /// Identifier of a client row
    ClientId
);

/// A salon client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    /// Display name
    pub name: String,
    pub phone: String,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub email: Option<String>,
    /// Assigned by the store, never changes afterwards
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl NewClient {
    /// Create a new client payload; blank emails are stored as null.
    #[must_use]
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            phone: phone.into().trim().to_string(),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = normalize_text_option(Some(email.into()));
        self
    }
}

/// Partial update for a client. `email: Some(None)` clears the address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
}

impl Record for Client {
    type Id = ClientId;
    type Draft = NewClient;
    type Patch = ClientPatch;

    const TABLE: Table = Table::Clients;

    fn id(&self) -> &ClientId {
        &self.id
    }

    fn validate_draft(draft: &NewClient) -> Result<()> {
        require_text("client name", &draft.name)?;
        require_text("client phone", &draft.phone)
    }

    fn validate_patch(patch: &ClientPatch) -> Result<()> {
        if let Some(name) = &patch.name {
            require_text("client name", name)?;
        }
        if let Some(phone) = &patch.phone {
            require_text("client phone", phone)?;
        }
        Ok(())
    }
}

pub(super) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::InvalidInput(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_normalizes_blank_email() {
        let client = NewClient::new(" Anna Nowak ", "600 100 200").with_email("  ");
        assert_eq!(client.name, "Anna Nowak");
        assert_eq!(client.email, None);

        let payload = serde_json::to_value(&client).unwrap();
        assert!(payload["email"].is_null());
    }

    #[test]
    fn validate_draft_rejects_blank_name() {
        let error = Client::validate_draft(&NewClient::new("  ", "600")).unwrap_err();
        assert!(error.to_string().contains("client name"));
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = ClientPatch {
            phone: Some("700".to_string()),
            email: Some(None),
            ..ClientPatch::default()
        };
        let payload = serde_json::to_value(&patch).unwrap();
        assert_eq!(payload, serde_json::json!({ "phone": "700", "email": null }));
    }

    #[test]
    fn client_row_parses_store_payload() {
        let client: Client = serde_json::from_value(serde_json::json!({
            "id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11",
            "name": "Anna",
            "phone": "600",
            "email": null,
            "created_at": "2024-01-10T09:00:00.123456+00:00"
        }))
        .unwrap();
        assert_eq!(client.name, "Anna");
        assert_eq!(client.email, None);
    }

    #[test]
    fn blank_email_column_reads_as_none() {
        let client: Client = serde_json::from_value(serde_json::json!({
            "id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11",
            "name": "Anna",
            "phone": "600",
            "email": "   ",
            "created_at": "2024-01-10T09:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(client.email, None);
    }

    #[test]
    fn client_id_parses_canonical_and_padded_text() {
        let id: ClientId = "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11".parse().unwrap();
        assert_eq!(id.to_string(), "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11");
        assert_eq!(" 0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11 ".parse::<ClientId>().unwrap(), id);
        assert!("not-a-uuid".parse::<ClientId>().is_err());
    }
}
