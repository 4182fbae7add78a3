//! Local reference allocation and the reference tagged union.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Temporary handle linking not-yet-persisted entities within a batch.
///
/// Allocated before an entity has a server identity, so a sibling entry in the
/// same batch can point at it. Uniqueness across the process comes from the
/// random v4 uuid; no shared counter state is involved. Once the resolver maps
/// a `LocalId` to a permanent identifier it must never be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Allocate a fresh, process-unique local id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// `urn:uuid:…` rendering used as the placeholder on the wire.
    pub fn as_urn(&self) -> String {
        format!("urn:uuid:{}", self.0)
    }

    /// Parse the `urn:uuid:…` rendering back into a local id.
    pub fn parse_urn(value: &str) -> Option<Self> {
        let raw = value.strip_prefix("urn:uuid:")?;
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:uuid:{}", self.0)
    }
}

/// Either a server-assigned identifier or a batch-local placeholder.
///
/// Modeled as a tagged union instead of a string-prefix convention so that
/// "is this persisted yet" is answered by the type, not by sniffing the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reference {
    /// Not yet persisted; valid only inside the workflow that allocated it
    Local(LocalId),
    /// Server-assigned identifier, e.g. `Patient/123`
    Permanent(String),
}

impl Reference {
    /// Permanent reference from anything string-like.
    pub fn permanent(id: impl Into<String>) -> Self {
        Reference::Permanent(id.into())
    }

    /// Wire rendering: local references render in their `urn:uuid` form.
    pub fn render(&self) -> String {
        match self {
            Reference::Local(id) => id.as_urn(),
            Reference::Permanent(id) => id.clone(),
        }
    }
}

impl From<LocalId> for Reference {
    fn from(id: LocalId) -> Self {
        Reference::Local(id)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
