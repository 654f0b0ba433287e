//! Line-oriented record parser.
//!
//! Turns a (possibly partial) `key: value` transcript into a [`Record`].
//! Parsing is a pure function of the input text: the accumulator re-runs it
//! over the whole cumulative snapshot every time, so it must be cheap and
//! must never fail.
//!
//! Rules:
//! - lines are split on `\n`; blank lines are skipped;
//! - a line without `:` is ignored (commentary, or a line cut off mid-stream);
//! - the line is split on the **first** `:` only, so values may contain `:`;
//! - key and value are trimmed; an empty key is legal;
//! - a repeated key overwrites the earlier value (last write wins).
//!
//! Keys are not checked against the schema here.

use crate::record::Record;

/// The key/value separator.
pub const SEPARATOR: char = ':';

/// Parse a text block into a record.
pub fn parse_record(text: &str) -> Record {
    let mut record = Record::new();
    for line in text.lines() {
        if let Some((key, value)) = parse_line(line) {
            record.insert(key, value);
        }
    }
    record
}

/// Split a single line into a trimmed `(key, value)` pair.
///
/// Returns `None` for blank lines and lines without a separator.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    if line.trim().is_empty() {
        return None;
    }
    let (key, value) = line.split_once(SEPARATOR)?;
    Some((key.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_lines() {
        let r = parse_record("Title: Deep Learning\nBio: Professor at X");
        assert_eq!(r.get("Title"), Some("Deep Learning"));
        assert_eq!(r.get("Bio"), Some("Professor at X"));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn splits_on_first_separator_only() {
        let r = parse_record("会议时间: 2024-05-01 14:30");
        assert_eq!(r.get("会议时间"), Some("2024-05-01 14:30"));
    }

    #[test]
    fn reparse_is_idempotent() {
        let text = "Title: A\nnoise\nBio: B: C\n\nTitle: A2";
        assert_eq!(parse_record(text), parse_record(text));
    }

    #[test]
    fn last_write_wins() {
        let r = parse_record("Title: first\nBio: b\nTitle: second");
        assert_eq!(r.get("Title"), Some("second"));
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["Title", "Bio"]);
    }

    #[test]
    fn malformed_lines_are_ignored() {
        let with_noise = parse_record("Here is the information you asked for\nTitle: A\nAbstr");
        let clean = parse_record("Title: A");
        assert_eq!(with_noise, clean);
    }

    #[test]
    fn empty_key_is_legal() {
        let r = parse_record(": value");
        assert_eq!(r.len(), 1);
        assert_eq!(r.get(""), Some("value"));
    }

    #[test]
    fn empty_input_gives_empty_record() {
        assert!(parse_record("").is_empty());
        assert!(parse_record("\n\n   \n").is_empty());
    }

    #[test]
    fn one_physical_line_is_one_field() {
        let r = parse_record("Title: A Bio: B Room: C");
        assert_eq!(r.len(), 1);
        assert_eq!(r.get("Title"), Some("A Bio: B Room: C"));
    }

    #[test]
    fn trims_whitespace_and_carriage_returns() {
        let r = parse_record("  Bio  :   hello world  \r\nRoom:\t101\r");
        assert_eq!(r.get("Bio"), Some("hello world"));
        assert_eq!(r.get("Room"), Some("101"));
    }

    #[test]
    fn key_with_empty_value_is_kept() {
        let r = parse_record("主办方:");
        assert_eq!(r.get("主办方"), Some(""));
    }
}
