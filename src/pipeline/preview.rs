//! Preview renderer: a scannable Markdown summary of the current record.
//!
//! One `### heading` section per field, value on the next line. Long values
//! are elided to `head...tail` for display only; the record itself and the
//! final template render always use the full value.

use crate::config::{ExtractionConfig, FieldFilter};
use crate::record::Record;
use crate::schema::{FieldSchema, PreviewPolicy};
use std::borrow::Cow;

/// Marker inserted between the head and tail of an elided value.
pub const ELLIPSIS: &str = "...";

/// Render the preview for `record`.
///
/// With `show_missing_fields` off, sections follow record insertion order.
/// With it on, every schema field is listed first in schema order (absent
/// ones showing `pending_text`), followed by any extra observed keys that
/// the field filter lets through.
pub fn render_preview(record: &Record, schema: &FieldSchema, config: &ExtractionConfig) -> String {
    let mut out = String::new();

    if config.show_missing_fields {
        for field in schema.fields() {
            let value = record
                .get(&field.key)
                .or_else(|| record.get_folded(&field.key));
            match value {
                Some(v) => push_section(&mut out, field.label(), &elide_for(v, field.preview, config)),
                None => push_section(&mut out, field.label(), &config.pending_text),
            }
        }
        if config.field_filter == FieldFilter::All {
            for (key, value) in record.iter().filter(|(k, _)| !schema.contains(k)) {
                push_section(&mut out, key, &elide_for(value, PreviewPolicy::Default, config));
            }
        }
        return out;
    }

    for (key, value) in record.iter() {
        let spec = schema.lookup(key);
        if config.field_filter == FieldFilter::SchemaOnly && spec.is_none() {
            continue;
        }
        let label = spec.map(|f| f.label()).unwrap_or(key);
        let policy = spec.map(|f| f.preview).unwrap_or_default();
        push_section(&mut out, label, &elide_for(value, policy, config));
    }
    out
}

fn push_section(out: &mut String, heading: &str, body: &str) {
    out.push_str("### ");
    out.push_str(heading);
    out.push('\n');
    out.push_str(body);
    out.push('\n');
}

fn elide_for<'a>(value: &'a str, policy: PreviewPolicy, config: &ExtractionConfig) -> Cow<'a, str> {
    match policy {
        PreviewPolicy::Full => Cow::Borrowed(value),
        PreviewPolicy::Default => elide(
            value,
            config.preview_max_chars,
            config.preview_head,
            config.preview_tail,
        ),
        PreviewPolicy::Elide {
            max_chars,
            head,
            tail,
        } => elide(value, max_chars, head, tail),
    }
}

/// Shorten `value` to `head + "..." + tail` characters when it is longer than
/// `max_chars` characters.
///
/// Counts Unicode scalar values, not bytes, so CJK text is cut on character
/// boundaries. Values are returned unchanged when the head and tail would
/// overlap.
///
/// ```rust
/// use edgequake_flyer2md::pipeline::preview::elide;
///
/// let v = "abcdefghijklmnopqrstuvwxyz0123456789ABCD"; // 40 chars
/// assert_eq!(elide(v, 30, 15, 15), "abcdefghijklmno...z0123456789ABCD");
/// ```
pub fn elide(value: &str, max_chars: usize, head: usize, tail: usize) -> Cow<'_, str> {
    let len = value.chars().count();
    if len <= max_chars || head + tail >= len {
        return Cow::Borrowed(value);
    }
    let head_end = value
        .char_indices()
        .nth(head)
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    let tail_start = value
        .char_indices()
        .nth(len - tail)
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    Cow::Owned(format!("{}{}{}", &value[..head_end], ELLIPSIS, &value[tail_start..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldSpec::new("Title"),
            FieldSpec::new("Bio").display_name("Speaker bio"),
            FieldSpec::new("Time").preview(PreviewPolicy::Full),
        ])
        .unwrap()
    }

    #[test]
    fn forty_chars_elide_to_head_and_tail() {
        let v: String = ('a'..='z').chain('A'..='N').collect();
        assert_eq!(v.chars().count(), 40);
        let expected = format!("{}...{}", &v[..15], &v[25..]);
        assert_eq!(elide(&v, 30, 15, 15), expected);
    }

    #[test]
    fn short_values_are_untouched() {
        let v = "x".repeat(30);
        assert_eq!(elide(&v, 30, 15, 15), v);
    }

    #[test]
    fn elides_on_char_boundaries() {
        let v = "学".repeat(40);
        let out = elide(&v, 30, 15, 15);
        assert_eq!(out.chars().count(), 33);
        assert!(out.contains(ELLIPSIS));
    }

    #[test]
    fn overlapping_head_and_tail_leave_value_alone() {
        assert_eq!(elide("abcdefghij", 5, 6, 6), "abcdefghij");
    }

    #[test]
    fn observed_fields_in_record_order() {
        let mut r = Record::new();
        r.insert("Bio", "B");
        r.insert("Title", "A");
        let out = render_preview(&r, &schema(), &ExtractionConfig::default());
        assert_eq!(out, "### Speaker bio\nB\n### Title\nA\n");
    }

    #[test]
    fn missing_fields_show_pending() {
        let config = ExtractionConfig::builder()
            .show_missing_fields(true)
            .pending_text("pending")
            .build()
            .unwrap();
        let mut r = Record::new();
        r.insert("Extra", "x");
        r.insert("Title", "A");
        let out = render_preview(&r, &schema(), &config);
        assert_eq!(
            out,
            "### Title\nA\n### Speaker bio\npending\n### Time\npending\n### Extra\nx\n"
        );
    }

    #[test]
    fn schema_only_hides_unknown_keys() {
        let config = ExtractionConfig::builder()
            .field_filter(FieldFilter::SchemaOnly)
            .build()
            .unwrap();
        let mut r = Record::new();
        r.insert("Extra", "x");
        r.insert("title", "A");
        let out = render_preview(&r, &schema(), &config);
        assert_eq!(out, "### Title\nA\n");
    }

    #[test]
    fn full_policy_skips_elision() {
        let long = "2024-05-01 14:30, followed by a long note";
        let mut r = Record::new();
        r.insert("Time", long);
        let out = render_preview(&r, &schema(), &ExtractionConfig::default());
        assert!(out.contains(long));
    }

    #[test]
    fn preview_does_not_mutate_record() {
        let long = "y".repeat(50);
        let mut r = Record::new();
        r.insert("Title", long.clone());
        let _ = render_preview(&r, &schema(), &ExtractionConfig::default());
        assert_eq!(r.get("Title"), Some(long.as_str()));
    }

    #[test]
    fn empty_record_renders_nothing() {
        assert_eq!(
            render_preview(&Record::new(), &schema(), &ExtractionConfig::default()),
            ""
        );
    }
}
