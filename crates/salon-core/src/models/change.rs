//! Row change notifications emitted by the remote store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Record, Table};
use crate::{Error, Result};

/// Kind of row mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown change kind '{other}'")),
        }
    }
}

/// A change event as delivered by the feed, before decoding into a typed row.
///
/// `after` carries the full row for inserts and updates; `before` carries at
/// least the primary key for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChange {
    pub kind: ChangeKind,
    pub table: Table,
    #[serde(default)]
    pub before: Option<Value>,
    #[serde(default)]
    pub after: Option<Value>,
}

impl RawChange {
    #[must_use]
    pub const fn insert(table: Table, after: Value) -> Self {
        Self {
            kind: ChangeKind::Insert,
            table,
            before: None,
            after: Some(after),
        }
    }

    #[must_use]
    pub const fn update(table: Table, before: Option<Value>, after: Value) -> Self {
        Self {
            kind: ChangeKind::Update,
            table,
            before,
            after: Some(after),
        }
    }

    #[must_use]
    pub const fn delete(table: Table, before: Value) -> Self {
        Self {
            kind: ChangeKind::Delete,
            table,
            before: Some(before),
            after: None,
        }
    }

    /// Primary key of the affected row, if the payload carries one.
    #[must_use]
    pub fn row_id(&self) -> Option<&str> {
        let row = match self.kind {
            ChangeKind::Delete => self.before.as_ref(),
            ChangeKind::Insert | ChangeKind::Update => self.after.as_ref(),
        }?;
        row.get("id").and_then(Value::as_str)
    }
}

/// A decoded change for one row of `R`'s table.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange<R: Record> {
    Insert(R),
    Update(R),
    Delete(R::Id),
}

impl<R: Record> RowChange<R> {
    #[must_use]
    pub fn id(&self) -> &R::Id {
        match self {
            Self::Insert(row) | Self::Update(row) => row.id(),
            Self::Delete(id) => id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete(_) => ChangeKind::Delete,
        }
    }

    /// Decode a feed event addressed to `R`'s table.
    pub fn decode(raw: &RawChange) -> Result<Self> {
        if raw.table != R::TABLE {
            return Err(Error::InvalidInput(format!(
                "change for table {} cannot apply to {}",
                raw.table,
                R::TABLE
            )));
        }

        match raw.kind {
            ChangeKind::Insert => Ok(Self::Insert(decode_row(raw.after.as_ref(), raw)?)),
            ChangeKind::Update => Ok(Self::Update(decode_row(raw.after.as_ref(), raw)?)),
            ChangeKind::Delete => {
                let id = raw
                    .before
                    .as_ref()
                    .and_then(|before| before.get("id"))
                    .ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "{} event on {} has no previous row id",
                            raw.kind, raw.table
                        ))
                    })?;
                Ok(Self::Delete(serde_json::from_value(id.clone())?))
            }
        }
    }
}

fn decode_row<R: Record>(row: Option<&Value>, raw: &RawChange) -> Result<R> {
    let row = row.ok_or_else(|| {
        Error::InvalidInput(format!("{} event on {} has no row", raw.kind, raw.table))
    })?;
    Ok(serde_json::from_value(row.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Client, Service};
    use serde_json::json;

    fn client_row() -> Value {
        json!({
            "id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11",
            "name": "Anna",
            "phone": "600",
            "created_at": "2024-01-10T09:00:00Z"
        })
    }

    #[test]
    fn decode_insert_reads_after_row() {
        let raw = RawChange::insert(Table::Clients, client_row());
        let change = RowChange::<Client>::decode(&raw).unwrap();
        assert_eq!(change.kind(), ChangeKind::Insert);
        assert_eq!(change.id().to_string(), "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11");
    }

    #[test]
    fn decode_delete_needs_only_the_key() {
        let raw = RawChange::delete(
            Table::Clients,
            json!({ "id": "0190f6a4-7d43-7a51-9d6c-0a6c2f0f6b11" }),
        );
        let change = RowChange::<Client>::decode(&raw).unwrap();
        assert_eq!(change.kind(), ChangeKind::Delete);
    }

    #[test]
    fn decode_rejects_wrong_table() {
        let raw = RawChange::insert(Table::Clients, client_row());
        assert!(RowChange::<Service>::decode(&raw).is_err());
    }

    #[test]
    fn decode_rejects_delete_without_key() {
        let raw = RawChange::delete(Table::Clients, json!({}));
        assert!(RowChange::<Client>::decode(&raw).is_err());
    }

    #[test]
    fn change_kind_parses_case_insensitively() {
        assert_eq!("update".parse::<ChangeKind>().unwrap(), ChangeKind::Update);
        assert!("UPSERT".parse::<ChangeKind>().is_err());
    }

    #[test]
    fn row_id_prefers_the_relevant_side() {
        let raw = RawChange::delete(Table::Clients, json!({ "id": "abc" }));
        assert_eq!(raw.row_id(), Some("abc"));
    }
}
