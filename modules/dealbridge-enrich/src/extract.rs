//! Structured extraction: acquired content + an entity-type schema in, a
//! candidate record (or an explicit refusal) out.

use async_trait::async_trait;

use ai_client::util::truncate_to_char_boundary;
use ai_client::Claude;
use dealbridge_common::{EnrichError, ExtractFailure, FieldMap, FieldValue};

use crate::descriptor::{EntityDescriptor, FieldShape};

/// Content sent to the model is truncated to this prefix. Silent and
/// deterministic; bounds cost and latency.
pub const MAX_CONTENT_CHARS: usize = 30_000;

/// Extractor output, not yet merged into the persisted entity.
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub fields: FieldMap,
}

/// What came back from the model. Service-call failures are errors; these
/// three are answers.
#[derive(Debug, Clone)]
pub enum ExtractOutcome {
    Success(CandidateRecord),
    /// The model explicitly declined: not enough information in the content.
    Insufficient,
    /// The reply did not match the descriptor's schema.
    Malformed(String),
}

#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    async fn extract(
        &self,
        descriptor: &EntityDescriptor,
        entity_name: &str,
        source_url: &str,
        content: &str,
    ) -> Result<ExtractOutcome, EnrichError>;
}

// --- Claude-backed extractor ---

pub struct LlmExtractor {
    claude: Claude,
}

impl LlmExtractor {
    pub fn new(anthropic_api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(anthropic_api_key, model),
        }
    }

    pub fn with_claude(claude: Claude) -> Self {
        Self { claude }
    }
}

#[async_trait]
impl ProfileExtractor for LlmExtractor {
    async fn extract(
        &self,
        descriptor: &EntityDescriptor,
        entity_name: &str,
        source_url: &str,
        content: &str,
    ) -> Result<ExtractOutcome, EnrichError> {
        let content = truncate_to_char_boundary(content, MAX_CONTENT_CHARS);

        let user_prompt = format!(
            "Extract the {} profile for \"{}\".\n\nSource URL: {}\n\n---\n\n{}",
            descriptor.kind, entity_name, source_url, content
        );

        let value = self
            .claude
            .extract_value(descriptor.output_schema(), descriptor.system_prompt, &user_prompt)
            .await
            .map_err(|e| EnrichError::Extraction(ExtractFailure::Service(e.to_string())))?;

        Ok(parse_candidate(descriptor, value))
    }
}

/// Parse a raw tool reply into a candidate record against the descriptor.
///
/// Unknown fields are dropped; a known field with the wrong shape fails the
/// whole record. A reply with the sentinel set, or with nothing usable in
/// any field, is `Insufficient`.
pub fn parse_candidate(descriptor: &EntityDescriptor, value: serde_json::Value) -> ExtractOutcome {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return ExtractOutcome::Malformed("reply is not an object".to_string()),
    };

    if obj
        .get("insufficient_data")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
    {
        return ExtractOutcome::Insufficient;
    }

    let mut fields = FieldMap::new();
    for spec in descriptor.fields {
        let raw = match obj.get(spec.name) {
            Some(serde_json::Value::Null) | None => continue,
            Some(raw) => raw,
        };

        let parsed = match spec.shape {
            FieldShape::Text => match raw.as_str() {
                Some(s) if !s.trim().is_empty() => FieldValue::Text(s.trim().to_string()),
                Some(_) => continue,
                None => {
                    return ExtractOutcome::Malformed(format!(
                        "field '{}' should be a string, got {raw}",
                        spec.name
                    ))
                }
            },
            FieldShape::TextList => match raw.as_array() {
                Some(items) => {
                    let mut out = Vec::new();
                    for item in items {
                        match item.as_str() {
                            Some(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                            Some(_) => {}
                            None => {
                                return ExtractOutcome::Malformed(format!(
                                    "field '{}' should be an array of strings",
                                    spec.name
                                ))
                            }
                        }
                    }
                    if out.is_empty() {
                        continue;
                    }
                    FieldValue::List(out)
                }
                None => {
                    return ExtractOutcome::Malformed(format!(
                        "field '{}' should be an array, got {raw}",
                        spec.name
                    ))
                }
            },
            FieldShape::Records => match raw.as_array() {
                Some(items) => {
                    if items.iter().any(|i| !i.is_object()) {
                        return ExtractOutcome::Malformed(format!(
                            "field '{}' should be an array of objects",
                            spec.name
                        ));
                    }
                    if items.is_empty() {
                        continue;
                    }
                    FieldValue::Records(items.clone())
                }
                None => {
                    return ExtractOutcome::Malformed(format!(
                        "field '{}' should be an array, got {raw}",
                        spec.name
                    ))
                }
            },
        };

        fields.insert(spec.name.to_string(), parsed);
    }

    if fields.is_empty() {
        // Every field null without the sentinel set: same answer either way.
        return ExtractOutcome::Insufficient;
    }

    ExtractOutcome::Success(CandidateRecord { fields })
}
