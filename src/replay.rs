//! Offline replay of a finished transcript as a progressive stream.
//!
//! Lets a saved model answer drive a full session (preview after every line,
//! final render at the end) without calling the vision service. Each step
//! re-emits the cumulative text, matching how the live producer behaves.

use crate::error::Flyer2MdError;
use crate::recognition::{self, RecognitionEvent, RecognitionStream};

/// Split `text` into cumulative line prefixes.
///
/// `"a\nb\nc"` → `["a", "a\nb", "a\nb\nc"]`. Blank lines do not produce a
/// step of their own.
pub fn cumulative_snapshots(text: &str) -> Vec<String> {
    let mut snapshots = Vec::new();
    let mut end = 0;
    for line in text.split_inclusive('\n') {
        end += line.len();
        if line.trim().is_empty() {
            continue;
        }
        snapshots.push(text[..end].trim_end_matches(['\n', '\r']).to_string());
    }
    snapshots
}

/// A recognition stream replaying `text` line by line, then `Done(text)`.
pub fn replay_stream(text: &str) -> RecognitionStream {
    let mut events: Vec<Result<RecognitionEvent, Flyer2MdError>> = cumulative_snapshots(text)
        .into_iter()
        .map(|s| Ok(RecognitionEvent::Snapshot(s)))
        .collect();
    events.push(Ok(RecognitionEvent::Done(text.to_string())));
    recognition::scripted(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn prefixes_grow_line_by_line() {
        assert_eq!(
            cumulative_snapshots("Title: A\n\nBio: B\n"),
            vec!["Title: A".to_string(), "Title: A\n\nBio: B".to_string()]
        );
    }

    #[test]
    fn empty_text_has_no_steps() {
        assert!(cumulative_snapshots("").is_empty());
    }

    #[tokio::test]
    async fn replay_ends_with_full_text() {
        let text = "Title: A\nBio: B\n";
        let events: Vec<_> = replay_stream(text).collect().await;
        match events.last() {
            Some(Ok(RecognitionEvent::Done(t))) => assert_eq!(t, text),
            other => panic!("unexpected last event: {other:?}"),
        }
        assert_eq!(events.len(), 3);
    }
}
