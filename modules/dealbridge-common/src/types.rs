use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Entity kinds ---

/// The record types subject to enrichment. Each kind carries its own
/// enrichable-field schema and extraction prompt (see the descriptor table
/// in the enrich crate); everything else about the pipeline is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Buyer,
    Company,
    Contact,
    Lead,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Buyer => "buyer",
            EntityKind::Company => "company",
            EntityKind::Contact => "contact",
            EntityKind::Lead => "lead",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(EntityKind::Buyer),
            "company" => Ok(EntityKind::Company),
            "contact" => Ok(EntityKind::Contact),
            "lead" => Ok(EntityKind::Lead),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

// --- Field values ---

/// A single enrichable field. Entity profiles are flat maps of these; the
/// three shapes cover every field the descriptors define.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Records(Vec<serde_json::Value>),
}

impl FieldValue {
    /// Empty means "nothing here worth keeping": blank/whitespace text or an
    /// empty list. Fill-if-empty treats these the same as an absent field.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Records(items) => items.is_empty(),
        }
    }
}

pub type FieldMap = BTreeMap<String, FieldValue>;

// --- Identity resolution ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Unresolved,
    Ambiguous,
    Ok,
    Error,
}

/// A ranked external-organization candidate, persisted on the entity only
/// between an ambiguous search and a confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub employee_count: Option<u32>,
}

// --- Entity record ---

/// A business record subject to enrichment.
///
/// `enriched_at` is non-null iff at least one successful extraction has
/// completed for this entity. `enriched_data` always holds the most recent
/// successful extractor output verbatim, independent of which fields the
/// merge policy actually wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: Uuid,
    pub kind: EntityKind,
    pub name: String,
    /// Natural key within the kind: domain, email, or external-system id.
    pub natural_key: String,
    pub website: Option<String>,
    pub fields: FieldMap,
    pub enriched_at: Option<DateTime<Utc>>,
    pub enrichment_source: Option<String>,
    pub enriched_data: Option<serde_json::Value>,
    pub resolution: ResolutionStatus,
    pub candidates: Vec<CandidateMatch>,
}

impl EntityRecord {
    pub fn new(kind: EntityKind, name: &str, natural_key: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.to_string(),
            natural_key: natural_key.to_string(),
            website: None,
            fields: FieldMap::new(),
            enriched_at: None,
            enrichment_source: None,
            enriched_data: None,
            resolution: ResolutionStatus::Unresolved,
            candidates: Vec::new(),
        }
    }

    pub fn with_website(mut self, website: &str) -> Self {
        self.website = Some(website.to_string());
        self
    }
}

// --- Pipeline runs (audit trail) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScope {
    Single,
    Batch,
    Preview,
}

impl RunScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunScope::Single => "single",
            RunScope::Batch => "batch",
            RunScope::Preview => "preview",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }
}

/// One audit row per pipeline invocation. Created at start, finalized exactly
/// once, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub scope: RunScope,
    pub entity_id: Option<Uuid>,
    pub entity_kind: Option<EntityKind>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
    pub error: Option<String>,
    pub summary: Option<serde_json::Value>,
}
