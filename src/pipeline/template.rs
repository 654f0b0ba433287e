//! Template renderer: fill `{{field}}` placeholders from a finished record.
//!
//! Each record key `K` fills the placeholder `{{lowercase(K)}}`. Placeholders
//! without a matching key stay verbatim, which is how a partially extracted
//! flyer still produces a usable document. When two keys fold to the same
//! placeholder, the one inserted into the record last wins.
//!
//! Substitution is a single pass over the template: a value that itself
//! contains `{{something}}` is copied literally and never expanded.

use crate::config::FieldFilter;
use crate::error::Flyer2MdError;
use crate::record::Record;
use crate::schema::FieldSchema;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Built-in Markdown template for [`FieldSchema::flyer`].
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/flyer.md");

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^{}]*)\}\}").unwrap());

/// A loaded template. Immutable and cheap to share between sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
    source: Option<PathBuf>,
}

impl Default for Template {
    fn default() -> Self {
        Self::from_text(DEFAULT_TEMPLATE)
    }
}

impl Template {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    /// Read a template file.
    pub async fn load(path: &Path) -> Result<Self, Flyer2MdError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Flyer2MdError::TemplateReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
        Ok(Self {
            text,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Path the template was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Placeholder names the template uses, in order of first appearance.
    pub fn placeholders(&self) -> Vec<String> {
        unresolved_placeholders(&self.text)
    }

    /// Render with every record key eligible.
    pub fn render(&self, record: &Record) -> String {
        render(record, &self.text)
    }

    /// Render, dropping keys the field filter excludes.
    pub fn render_filtered(&self, record: &Record, schema: &FieldSchema, filter: FieldFilter) -> String {
        match filter {
            FieldFilter::All => render(record, &self.text),
            FieldFilter::SchemaOnly => {
                let mut kept = record.clone();
                kept.retain_keys(|k| schema.contains(k));
                render(&kept, &self.text)
            }
        }
    }
}

/// Substitute every `{{lowercase(key)}}` in `template` with the key's value.
pub fn render(record: &Record, template: &str) -> String {
    // Later inserts overwrite earlier ones that fold to the same token.
    let mut values: HashMap<String, &str> = HashMap::with_capacity(record.len());
    for (key, value) in record.iter() {
        values.insert(key.to_lowercase(), value);
    }

    RE_PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => (*value).to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names of `{{...}}` tokens still present in `text`, deduplicated in order
/// of first appearance.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in RE_PLACEHOLDER.captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    #[test]
    fn substitutes_case_folded_keys_and_keeps_unmatched() {
        let mut r = Record::new();
        r.insert("Name", "Alice");
        assert_eq!(render(&r, "Hi {{name}}, room {{room}}."), "Hi Alice, room {{room}}.");
    }

    #[test]
    fn replaces_every_occurrence() {
        let r: Record = [("Title", "T")].into_iter().collect();
        assert_eq!(render(&r, "{{title}} / {{title}}"), "T / T");
    }

    #[test]
    fn colliding_keys_last_inserted_wins() {
        let r: Record = [("Name", "first"), ("NAME", "second")].into_iter().collect();
        assert_eq!(render(&r, "{{name}}"), "second");
    }

    #[test]
    fn values_are_not_re_expanded() {
        let r: Record = [("Bio", "see {{room}}"), ("Room", "101")].into_iter().collect();
        assert_eq!(render(&r, "{{bio}} | {{room}}"), "see {{room}} | 101");
    }

    #[test]
    fn upper_case_placeholder_is_not_a_match() {
        let r: Record = [("Name", "Alice")].into_iter().collect();
        assert_eq!(render(&r, "{{Name}}"), "{{Name}}");
    }

    #[test]
    fn empty_key_fills_empty_placeholder() {
        let r: Record = [("", "value")].into_iter().collect();
        assert_eq!(render(&r, "[{{}}]"), "[value]");
    }

    #[test]
    fn schema_only_filter_leaves_unknown_placeholders() {
        let schema = FieldSchema::new(vec![FieldSpec::new("Title")]).unwrap();
        let r: Record = [("Title", "T"), ("Extra", "x")].into_iter().collect();
        let t = Template::from_text("{{title}} {{extra}}");
        assert_eq!(t.render_filtered(&r, &schema, FieldFilter::All), "T x");
        assert_eq!(
            t.render_filtered(&r, &schema, FieldFilter::SchemaOnly),
            "T {{extra}}"
        );
    }

    #[test]
    fn lists_unresolved_placeholders_once() {
        assert_eq!(
            unresolved_placeholders("{{a}} {{b}} {{a}}"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn default_template_covers_flyer_schema() {
        let placeholders = Template::default().placeholders();
        for field in FieldSchema::flyer().fields() {
            assert!(
                placeholders.contains(&field.normalized_key()),
                "missing {{{{{}}}}}",
                field.normalized_key()
            );
        }
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let err = Template::load(Path::new("/definitely/not/here.md"))
            .await
            .expect_err("missing template");
        assert!(matches!(err, Flyer2MdError::TemplateReadFailed { .. }));
    }
}
