//! Snapshot sanitisation: deterministic cleanup of producer text before parsing.
//!
//! Vision models drift from the requested `key: value` shape in a few
//! predictable ways, and partial snapshots make it worse:
//!
//! - the whole answer wrapped in a ```` ``` ```` fence, whose closing fence
//!   has not arrived yet in early snapshots;
//! - Windows `\r\n` line endings;
//! - zero-width spaces and BOMs glued to keys, which break placeholder matching.
//!
//! [`clean_snapshot`] fixes those without touching content. [`normalize_keys`]
//! is stronger and opt-in (see [`crate::ExtractionConfig::normalize_keys`]):
//! it rewrites key syntax the model was told not to use (full-width colons,
//! `**bold**` keys, list markers).

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply the always-on cleanup rules to a raw snapshot.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Strip an outer code fence, terminated or not
pub fn clean_snapshot(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    strip_code_fences(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Strip outer code fences ──────────────────────────────────────────
//
// Only a fence on the first non-blank line counts as "outer". The closing
// fence is removed when it is the last non-blank line; in a partial snapshot
// it is simply absent.

static RE_OPENING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9_-]*\s*$").unwrap());

static RE_CLOSING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let Some(first) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return input.to_string();
    };
    if !RE_OPENING_FENCE.is_match(lines[first]) {
        return input.to_string();
    }

    let mut body = &lines[first + 1..];
    if let Some(last) = body.iter().rposition(|l| !l.trim().is_empty()) {
        if RE_CLOSING_FENCE.is_match(body[last]) {
            body = &body[..last];
        }
    }
    body.join("\n")
}

// ── Opt-in: key normalisation ────────────────────────────────────────────────

static RE_LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d{1,2}[.)、])\s+").unwrap());

/// Rewrite drifted key syntax into plain `key: value` lines.
///
/// Per line:
/// - a full-width colon `：` that precedes any ASCII `:` becomes `:`;
/// - a leading list marker (`- `, `* `, `1. `, `2) `) is dropped;
/// - Markdown emphasis around the key (`**Bio**:`, `**Bio:**`) is dropped.
///
/// Lines without a separator are passed through untouched.
pub fn normalize_keys(input: &str) -> String {
    input
        .lines()
        .map(normalize_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize_line(line: &str) -> String {
    let folded = fold_fullwidth_colon(line);
    let Some((raw_key, raw_value)) = folded.split_once(':') else {
        return folded;
    };

    let key = RE_LIST_MARKER.replace(raw_key, "");
    let key = key.trim();
    let opened_emphasis = key.starts_with("**") || key.starts_with("__");
    let key = key.trim_matches(|c| c == '*' || c == '_').trim();

    let mut value = raw_value.trim_start();
    if opened_emphasis {
        value = value
            .strip_prefix("**")
            .or_else(|| value.strip_prefix("__"))
            .unwrap_or(value)
            .trim_start();
    }
    format!("{}: {}", key, value)
}

fn fold_fullwidth_colon(line: &str) -> String {
    match (line.find('：'), line.find(':')) {
        (Some(full), Some(ascii)) if ascii < full => line.to_string(),
        (Some(_), _) => line.replacen('：', ":", 1),
        _ => line.to_string(),
    }
}
