//! Service model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::client::require_text;
use super::id::record_id;
use super::{Record, Table};
use crate::{Error, Result};

record_id!(
    /// Identifier of a service row
    ServiceId
);

/// A bookable salon service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    /// Duration in minutes
    pub duration: u32,
    /// Current list price
    pub price: Decimal,
}

/// Insert payload for a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewService {
    pub name: String,
    pub duration: u32,
    pub price: Decimal,
}

impl NewService {
    #[must_use]
    pub fn new(name: impl Into<String>, duration: u32, price: Decimal) -> Self {
        Self {
            name: name.into().trim().to_string(),
            duration,
            price,
        }
    }
}

/// Partial update for a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServicePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

impl Record for Service {
    type Id = ServiceId;
    type Draft = NewService;
    type Patch = ServicePatch;

    const TABLE: Table = Table::Services;

    fn id(&self) -> &ServiceId {
        &self.id
    }

    fn validate_draft(draft: &NewService) -> Result<()> {
        require_text("service name", &draft.name)?;
        validate_duration(draft.duration)?;
        validate_price(draft.price)
    }

    fn validate_patch(patch: &ServicePatch) -> Result<()> {
        if let Some(name) = &patch.name {
            require_text("service name", name)?;
        }
        if let Some(duration) = patch.duration {
            validate_duration(duration)?;
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        Ok(())
    }
}

fn validate_duration(duration: u32) -> Result<()> {
    if duration == 0 {
        return Err(Error::InvalidInput(
            "service duration must be at least one minute".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(Error::InvalidInput(format!(
            "service price must not be negative (got {price})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_draft_rejects_zero_duration() {
        let draft = NewService::new("Cut", 0, Decimal::new(50, 0));
        assert!(Service::validate_draft(&draft).is_err());
    }

    #[test]
    fn validate_draft_rejects_negative_price() {
        let draft = NewService::new("Cut", 30, Decimal::new(-1, 0));
        assert!(Service::validate_draft(&draft).is_err());
    }

    #[test]
    fn validate_draft_accepts_free_service() {
        let draft = NewService::new("Consultation", 15, Decimal::ZERO);
        assert!(Service::validate_draft(&draft).is_ok());
    }

    #[test]
    fn service_row_parses_numeric_price() {
        let service: Service = serde_json::from_value(serde_json::json!({
            "id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b22",
            "name": "Colouring",
            "duration": 90,
            "price": 249.5
        }))
        .unwrap();
        assert_eq!(service.price, Decimal::new(2495, 1));
        assert_eq!(service.duration, 90);
    }
}
