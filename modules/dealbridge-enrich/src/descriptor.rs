//! Entity-type descriptors: the per-kind data that parameterizes the one
//! generic pipeline. Each kind contributes its enrichable-field schema and
//! extraction prompt; the control flow is shared.

use dealbridge_common::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Free text.
    Text,
    /// Array of short strings (tags, keywords).
    TextList,
    /// Array of small structured subrecords.
    Records,
}

pub struct FieldSpec {
    pub name: &'static str,
    pub shape: FieldShape,
    pub description: &'static str,
}

pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub fields: &'static [FieldSpec],
    pub system_prompt: &'static str,
}

impl EntityDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// JSON schema for the extractor's forced tool call. Every business field
    /// is nullable; `insufficient_data` must be set instead of guessing.
    pub fn output_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        properties.insert(
            "insufficient_data".to_string(),
            serde_json::json!({
                "type": "boolean",
                "description": "Set to true when the content does not contain enough \
                                information to fill any field. Never invent values."
            }),
        );

        for field in self.fields {
            let schema = match field.shape {
                FieldShape::Text => serde_json::json!({
                    "type": ["string", "null"],
                    "description": field.description,
                }),
                FieldShape::TextList => serde_json::json!({
                    "type": ["array", "null"],
                    "items": { "type": "string" },
                    "description": field.description,
                }),
                FieldShape::Records => serde_json::json!({
                    "type": ["array", "null"],
                    "items": { "type": "object" },
                    "description": field.description,
                }),
            };
            properties.insert(field.name.to_string(), schema);
        }

        let required: Vec<serde_json::Value> = properties
            .keys()
            .map(|k| serde_json::Value::String(k.clone()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

pub fn descriptor(kind: EntityKind) -> &'static EntityDescriptor {
    match kind {
        EntityKind::Buyer => &BUYER,
        EntityKind::Company => &COMPANY,
        EntityKind::Contact => &CONTACT,
        EntityKind::Lead => &LEAD,
    }
}

// --- Buyer ---

static BUYER: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Buyer,
    fields: &[
        FieldSpec {
            name: "description",
            shape: FieldShape::Text,
            description: "2-4 sentence summary of who this acquirer is and what they do",
        },
        FieldSpec {
            name: "sector_focus",
            shape: FieldShape::TextList,
            description: "Industry sectors this acquirer targets, e.g. \"logistics\", \"healthcare IT\"",
        },
        FieldSpec {
            name: "geography_focus",
            shape: FieldShape::TextList,
            description: "Regions or countries this acquirer invests in",
        },
        FieldSpec {
            name: "acquisition_thesis",
            shape: FieldShape::Text,
            description: "What this acquirer looks for in a target, in their own words where possible",
        },
        FieldSpec {
            name: "deal_size",
            shape: FieldShape::Text,
            description: "Stated deal size, revenue, or EBITDA range, if published",
        },
        FieldSpec {
            name: "keywords",
            shape: FieldShape::TextList,
            description: "Search keywords describing this acquirer's interests",
        },
        FieldSpec {
            name: "notable_acquisitions",
            shape: FieldShape::Records,
            description: "Past acquisitions mentioned on the site: {\"company\": str, \"year\": str?, \"note\": str?}",
        },
    ],
    system_prompt: r#"You extract acquirer profiles for an M&A advisory CRM.

You are given the text of a corporate or private-equity acquirer's website. Fill the profile fields from what the page actually says.

## Rules
- Use only information present in the content. Never invent sectors, geographies, or deal sizes.
- Prefer the acquirer's own wording for the acquisition thesis.
- Sector and geography entries are short tags ("industrial automation", "DACH"), not sentences.
- If the content is a parked domain, an error page, or otherwise says nothing about an acquirer, set insufficient_data to true and leave every field null.
- Leave any individual field null when the content does not cover it."#,
};

// --- Company / fund profile ---

static COMPANY: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Company,
    fields: &[
        FieldSpec {
            name: "description",
            shape: FieldShape::Text,
            description: "2-4 sentence summary of what this company does",
        },
        FieldSpec {
            name: "services",
            shape: FieldShape::TextList,
            description: "Products or services the company offers",
        },
        FieldSpec {
            name: "sector_tags",
            shape: FieldShape::TextList,
            description: "Industry sectors the company operates in",
        },
        FieldSpec {
            name: "highlights",
            shape: FieldShape::TextList,
            description: "Noteworthy facts a deal team would care about: scale, customers, certifications",
        },
        FieldSpec {
            name: "headquarters",
            shape: FieldShape::Text,
            description: "Headquarters city and country, if stated",
        },
        FieldSpec {
            name: "keywords",
            shape: FieldShape::TextList,
            description: "Search keywords describing this company",
        },
    ],
    system_prompt: r#"You extract company profiles for an M&A advisory CRM.

You are given the text of a company's website. Fill the profile fields from what the page actually says.

## Rules
- Use only information present in the content. Never invent services, sectors, or locations.
- Service and sector entries are short tags, not sentences.
- Highlights are concrete facts ("ISO 13485 certified", "40 locations across the Midwest"), not marketing slogans.
- If the content is a parked domain, an error page, or otherwise says nothing about a company, set insufficient_data to true and leave every field null.
- Leave any individual field null when the content does not cover it."#,
};

// --- Contact ---

static CONTACT: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Contact,
    fields: &[
        FieldSpec {
            name: "bio",
            shape: FieldShape::Text,
            description: "2-3 sentence professional biography",
        },
        FieldSpec {
            name: "title",
            shape: FieldShape::Text,
            description: "Current role or title",
        },
        FieldSpec {
            name: "expertise",
            shape: FieldShape::TextList,
            description: "Areas of professional expertise",
        },
        FieldSpec {
            name: "location",
            shape: FieldShape::Text,
            description: "City and country, if stated",
        },
    ],
    system_prompt: r#"You extract professional profiles for an M&A advisory CRM.

You are given the text of a personal, team, or company page mentioning a specific person. Fill the profile fields for that person only.

## Rules
- Use only information present in the content. Never invent titles or expertise.
- Ignore other people mentioned on the page.
- If the page does not actually cover this person, set insufficient_data to true and leave every field null.
- Leave any individual field null when the content does not cover it."#,
};

// --- Lead ---

static LEAD: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Lead,
    fields: &[
        FieldSpec {
            name: "description",
            shape: FieldShape::Text,
            description: "2-4 sentence summary of what this business does",
        },
        FieldSpec {
            name: "sector_focus",
            shape: FieldShape::TextList,
            description: "Industry sectors this business operates in",
        },
        FieldSpec {
            name: "headquarters",
            shape: FieldShape::Text,
            description: "Headquarters city and country, if stated",
        },
        FieldSpec {
            name: "keywords",
            shape: FieldShape::TextList,
            description: "Search keywords describing this business",
        },
    ],
    system_prompt: r#"You extract outreach-lead profiles for an M&A advisory CRM.

You are given the text of a business's website. Fill the profile fields from what the page actually says.

## Rules
- Use only information present in the content. Never invent sectors or locations.
- Sector entries are short tags, not sentences.
- If the content is a parked domain, an error page, or otherwise says nothing about a business, set insufficient_data to true and leave every field null.
- Leave any individual field null when the content does not cover it."#,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_descriptor() {
        for kind in [
            EntityKind::Buyer,
            EntityKind::Company,
            EntityKind::Contact,
            EntityKind::Lead,
        ] {
            let d = descriptor(kind);
            assert_eq!(d.kind, kind);
            assert!(!d.fields.is_empty());
            assert!(!d.system_prompt.is_empty());
        }
    }

    #[test]
    fn output_schema_includes_sentinel_and_all_fields() {
        let d = descriptor(EntityKind::Buyer);
        let schema = d.output_schema();
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("insufficient_data"));
        for field in d.fields {
            assert!(props.contains_key(field.name), "missing {}", field.name);
        }
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), props.len());
    }

    #[test]
    fn field_lookup_by_name() {
        let d = descriptor(EntityKind::Company);
        assert!(d.field("headquarters").is_some());
        assert!(d.field("acquisition_thesis").is_none());
    }
}
