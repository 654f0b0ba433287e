//! Extraction prompts for the vision model.
//!
//! The parser downstream only understands `key: value` lines, so the prompt's
//! job is to make the model emit exactly that shape, one line per field, with
//! the keys spelled as the schema spells them.
//!
//! Callers can override the prompt via
//! [`crate::config::ExtractionConfig::prompt`].

use crate::schema::FieldSchema;

/// Output rules appended after the field list.
pub const OUTPUT_RULES: &str = r#"Output rules:
- Write exactly one line per field, in the form `Key: value`.
- Use the keys exactly as listed above, followed by an ASCII colon.
- Keep each value on a single line; join multi-line text with spaces.
- If a field is not present on the document, write the key followed by an empty value.
- Do NOT use Markdown, bullet points, code fences, or bold text.
- Do NOT add commentary, explanations, or any other lines."#;

/// Build the extraction prompt for a schema.
///
/// ```rust
/// use edgequake_flyer2md::{prompts::extraction_prompt, FieldSchema};
///
/// let prompt = extraction_prompt(&FieldSchema::flyer());
/// assert!(prompt.contains("1. Bio"));
/// ```
pub fn extraction_prompt(schema: &FieldSchema) -> String {
    let mut prompt =
        String::from("Extract the following fields from the document in the image:\n");
    for (i, field) in schema.fields().iter().enumerate() {
        match field.description.as_deref() {
            Some(desc) => prompt.push_str(&format!("{}. {} ({})\n", i + 1, field.key, desc)),
            None => prompt.push_str(&format!("{}. {}\n", i + 1, field.key)),
        }
    }
    prompt.push('\n');
    prompt.push_str(OUTPUT_RULES);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    #[test]
    fn prompt_lists_fields_in_schema_order() {
        let prompt = extraction_prompt(&FieldSchema::flyer());
        let bio = prompt.find("1. Bio").expect("Bio listed");
        let venue = prompt.find("6. 会议地点").expect("venue listed");
        assert!(bio < venue);
        assert!(prompt.contains("YYYY-MM-DD HH:MM"));
    }

    #[test]
    fn prompt_omits_missing_description() {
        let schema = FieldSchema::new(vec![FieldSpec::new("Title")]).unwrap();
        let prompt = extraction_prompt(&schema);
        assert!(prompt.contains("1. Title\n"));
        assert!(prompt.ends_with(OUTPUT_RULES));
    }
}
