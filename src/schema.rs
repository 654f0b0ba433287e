//! Field schema: the expected fields of a flyer and how to show them.
//!
//! The schema never gates parsing: every key the producer emits is kept in
//! the [`crate::Record`]. It is consulted only when building the prompt,
//! rendering the preview (display names, elision, pending rows) and, when
//! [`crate::config::FieldFilter::SchemaOnly`] is configured, when deciding
//! which observed keys reach the preview and the template.
//!
//! Schemas can be loaded from JSON:
//!
//! ```json
//! { "fields": [
//!     { "key": "Title", "description": "talk title" },
//!     { "key": "Abstract", "preview": { "elide": { "max_chars": 60, "head": 30, "tail": 20 } } },
//!     { "key": "Room", "display_name": "Venue", "preview": "full" }
//! ] }
//! ```

use crate::error::Flyer2MdError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// How a field's value is shortened in the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewPolicy {
    /// Use the preview limits from [`crate::ExtractionConfig`].
    #[default]
    Default,
    /// Never elide this field.
    Full,
    /// Field-specific elision limits.
    Elide {
        max_chars: usize,
        head: usize,
        tail: usize,
    },
}

/// One expected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field key exactly as the producer is asked to emit it.
    pub key: String,
    /// Heading shown in the preview instead of the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Instruction for the producer, appended to the key in the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub preview: PreviewPolicy,
}

impl FieldSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: None,
            description: None,
            preview: PreviewPolicy::Default,
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn preview(mut self, policy: PreviewPolicy) -> Self {
        self.preview = policy;
        self
    }

    /// The preview heading for this field.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }

    /// Lower-cased key, the form used in template placeholders.
    pub fn normalized_key(&self) -> String {
        self.key.to_lowercase()
    }

    /// The template placeholder this field fills, e.g. `{{bio}}`.
    pub fn placeholder(&self) -> String {
        placeholder(&self.key)
    }
}

/// Template placeholder token for a record key.
pub fn placeholder(key: &str) -> String {
    format!("{{{{{}}}}}", key.to_lowercase())
}

/// The ordered set of fields a flyer is expected to carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::flyer()
    }
}

impl FieldSchema {
    /// Build a schema, rejecting keys that collide once lower-cased.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, Flyer2MdError> {
        let schema = Self { fields };
        schema.validate("<inline>")?;
        Ok(schema)
    }

    /// The academic-talk flyer fields.
    pub fn flyer() -> Self {
        Self {
            fields: vec![
                FieldSpec::new("Bio").description("speaker biography"),
                FieldSpec::new("Abstract").description("talk abstract"),
                FieldSpec::new("主讲人").description("speaker name"),
                FieldSpec::new("主办方").description("host organisation"),
                FieldSpec::new("会议时间")
                    .description("YYYY-MM-DD HH:MM, 24-hour clock")
                    .preview(PreviewPolicy::Full),
                FieldSpec::new("会议地点").description("venue"),
            ],
        }
    }

    /// Parse a schema from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self, Flyer2MdError> {
        let schema: FieldSchema =
            serde_json::from_str(json).map_err(|e| Flyer2MdError::InvalidSchema {
                origin: "<json>".into(),
                detail: e.to_string(),
            })?;
        schema.validate("<json>")?;
        Ok(schema)
    }

    /// Read and parse a JSON schema file.
    pub fn load(path: &Path) -> Result<Self, Flyer2MdError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| Flyer2MdError::InvalidSchema {
            origin: origin.clone(),
            detail: e.to_string(),
        })?;
        let schema: FieldSchema =
            serde_json::from_str(&text).map_err(|e| Flyer2MdError::InvalidSchema {
                origin: origin.clone(),
                detail: e.to_string(),
            })?;
        schema.validate(&origin)?;
        Ok(schema)
    }

    fn validate(&self, origin: &str) -> Result<(), Flyer2MdError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.normalized_key()) {
                return Err(Flyer2MdError::InvalidSchema {
                    origin: origin.to_string(),
                    detail: format!("duplicate key '{}'", field.key),
                });
            }
        }
        Ok(())
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Exact-key lookup.
    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Case-insensitive lookup, matching how template placeholders fold keys.
    pub fn lookup(&self, key: &str) -> Option<&FieldSpec> {
        self.get(key).or_else(|| {
            let folded = key.to_lowercase();
            self.fields.iter().find(|f| f.normalized_key() == folded)
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }
}
