//! Merge policy: decide which candidate fields get written over the
//! persisted profile. Pure functions, no IO.

use dealbridge_common::{FieldMap, FieldValue};

use crate::descriptor::EntityDescriptor;
use crate::extract::CandidateRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Write a candidate value only where the current value is absent or
    /// empty. Partial enrichment of a partially-filled profile is expected.
    #[default]
    FillIfEmpty,
    /// Overwrite every field the candidate has a non-empty value for.
    Force,
}

/// The field-level update set plus the names of business fields whose
/// persisted value actually changes. Run metadata (`enriched_at`,
/// `enrichment_source`, `enriched_data`) is stamped by the store write in
/// either mode and never appears here.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    pub updates: FieldMap,
    pub changed_fields: Vec<String>,
}

impl MergePlan {
    pub fn is_noop(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Evaluate the candidate against the current profile, field by field in
/// descriptor order. Candidate fields the descriptor does not know are
/// dropped; empty candidate values never overwrite anything.
pub fn plan_merge(
    descriptor: &EntityDescriptor,
    current: &FieldMap,
    candidate: &CandidateRecord,
    mode: MergeMode,
) -> MergePlan {
    let mut plan = MergePlan::default();

    for spec in descriptor.fields {
        let Some(incoming) = candidate.fields.get(spec.name) else {
            continue;
        };
        if incoming.is_empty() {
            continue;
        }

        let existing = current.get(spec.name);
        let writable = match mode {
            MergeMode::FillIfEmpty => existing.map_or(true, FieldValue::is_empty),
            MergeMode::Force => true,
        };
        if !writable {
            continue;
        }
        if existing == Some(incoming) {
            continue;
        }

        plan.updates.insert(spec.name.to_string(), incoming.clone());
        plan.changed_fields.push(spec.name.to_string());
    }

    plan
}
