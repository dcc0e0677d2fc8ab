//! The contract every mirrored row type fulfils.

use std::fmt;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Table;
use crate::Result;

/// A row of one of the mirrored tables.
///
/// Rows travel through the remote store as JSON objects; `Draft` is the insert
/// payload (no id, no store-assigned fields) and `Patch` the partial update
/// payload.
pub trait Record:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Store-assigned identifier
    type Id: Clone
        + Eq
        + Hash
        + fmt::Debug
        + fmt::Display
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Insert payload
    type Draft: Serialize + fmt::Debug + Send + Sync;

    /// Partial update payload
    type Patch: Serialize + fmt::Debug + Send + Sync;

    /// Table holding rows of this type
    const TABLE: Table;

    fn id(&self) -> &Self::Id;

    /// Reject drafts the store would refuse or that would corrupt views.
    fn validate_draft(draft: &Self::Draft) -> Result<()>;

    /// Reject patches with out-of-range values.
    fn validate_patch(patch: &Self::Patch) -> Result<()>;
}
