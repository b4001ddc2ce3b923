//! SSE plumbing shared by streaming adapters.
//!
//! An adapter hands a `reqwest::Response` plus a parser closure to
//! [`event_stream`]; the closure turns each `data:` payload into zero or
//! more [`ModelEvent`]s while this module handles chunk buffering, event
//! framing, and end-of-body flushing.

use cr_domain::error::{Error, Result};
use cr_domain::stream::{BoxStream, ModelEvent};

pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Pull complete `data:` payloads out of an SSE buffer.
///
/// Events are framed by a blank line (`\n\n`; `\r` is tolerated). Lines
/// other than `data:` (`event:`, `id:`, `retry:`, comments) are skipped.
/// Consumed bytes are removed in place; a trailing partial event stays
/// buffered for the next call.
pub(crate) fn take_data_payloads(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();

    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }

    while let Some(pos) = buffer.find("\n\n") {
        let frame: String = buffer.drain(..pos + 2).collect();
        for line in frame.lines() {
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
    }

    payloads
}

/// Build a [`BoxStream`] of model events from an SSE response body.
///
/// The parser is `FnMut` so adapters can keep assembly state across
/// payloads (tool-call argument accumulation). When the body closes
/// without the parser having emitted a `Finish`, one is synthesized so
/// downstream consumers always see a terminal event.
pub(crate) fn event_stream<F>(
    response: reqwest::Response,
    mut parse: F,
) -> BoxStream<'static, Result<ModelEvent>>
where
    F: FnMut(&str) -> Vec<Result<ModelEvent>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut finished = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for payload in take_data_payloads(&mut buffer) {
                        for event in parse(&payload) {
                            finished |= matches!(&event, Ok(ModelEvent::Finish { .. }));
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    // Body closed; a partial frame may still hold one event.
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for payload in take_data_payloads(&mut buffer) {
                            for event in parse(&payload) {
                                finished |= matches!(&event, Ok(ModelEvent::Finish { .. }));
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }

        if !finished {
            yield Ok(ModelEvent::Finish { usage: None, finish_reason: Some("stop".into()) });
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_event() {
        let mut buf = String::from("event: chunk\ndata: {\"a\":1}\n\n");
        assert_eq!(take_data_payloads(&mut buf), vec!["{\"a\":1}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn multiple_events_in_one_chunk() {
        let mut buf = String::from("data: one\n\ndata: two\n\n");
        assert_eq!(take_data_payloads(&mut buf), vec!["one", "two"]);
    }

    #[test]
    fn partial_frame_stays_buffered() {
        let mut buf = String::from("data: done\n\ndata: not yet");
        assert_eq!(take_data_payloads(&mut buf), vec!["done"]);
        assert_eq!(buf, "data: not yet");

        buf.push_str(" now\n\n");
        assert_eq!(take_data_payloads(&mut buf), vec!["not yet now"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn non_data_lines_ignored() {
        let mut buf = String::from("id: 7\nretry: 1000\ndata: payload\n\n");
        assert_eq!(take_data_payloads(&mut buf), vec!["payload"]);
    }

    #[test]
    fn crlf_framing_tolerated() {
        let mut buf = String::from("data: hi\r\n\r\ndata: there\r\n\r\n");
        assert_eq!(take_data_payloads(&mut buf), vec!["hi", "there"]);
    }

    #[test]
    fn done_sentinel_passes_through() {
        let mut buf = String::from("data: [DONE]\n\n");
        assert_eq!(take_data_payloads(&mut buf), vec!["[DONE]"]);
    }

    #[test]
    fn empty_data_line_dropped() {
        let mut buf = String::from("data:\n\n");
        assert!(take_data_payloads(&mut buf).is_empty());
    }
}
