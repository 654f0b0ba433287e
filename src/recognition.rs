//! The recognition stream consumed by an extraction session.
//!
//! The producer re-emits its full cumulative text at every step, so each
//! event carries a complete snapshot, never a delta. The stream ends with an
//! explicit [`RecognitionEvent::Done`] carrying the final text; a stream that
//! closes without it was abandoned and must not be rendered.

use crate::error::Flyer2MdError;
use futures::stream::{self, Stream};
use std::pin::Pin;

/// One step of the recognition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The full text produced so far.
    Snapshot(String),
    /// End of stream; carries the final full text.
    Done(String),
}

/// A boxed stream of recognition events.
pub type RecognitionStream =
    Pin<Box<dyn Stream<Item = Result<RecognitionEvent, Flyer2MdError>> + Send>>;

/// Build a recognition stream from a fixed list of events.
///
/// Handy for replaying recorded transcripts and for tests.
pub fn scripted(events: Vec<Result<RecognitionEvent, Flyer2MdError>>) -> RecognitionStream {
    Box::pin(stream::iter(events))
}

/// Snapshot events for each text in order, followed by `Done` with the last one.
pub fn from_snapshots<I, S>(snapshots: I) -> RecognitionStream
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let snapshots: Vec<String> = snapshots.into_iter().map(Into::into).collect();
    let last = snapshots.last().cloned().unwrap_or_default();
    let mut events: Vec<Result<RecognitionEvent, Flyer2MdError>> = snapshots
        .into_iter()
        .map(|s| Ok(RecognitionEvent::Snapshot(s)))
        .collect();
    events.push(Ok(RecognitionEvent::Done(last)));
    scripted(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn from_snapshots_ends_with_done() {
        let events: Vec<_> = from_snapshots(["a", "a\nb"]).collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[2], Ok(RecognitionEvent::Done(t)) if t == "a\nb"));
    }

    #[tokio::test]
    async fn empty_snapshot_list_is_just_done() {
        let events: Vec<_> = from_snapshots(Vec::<String>::new()).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Ok(RecognitionEvent::Done(t)) if t.is_empty()));
    }
}
