//! Turn normalization.
//!
//! Inbound histories arrive from clients in whatever state their local
//! store was in: interrupted tool loops, empty messages, file parts with
//! missing media types. Every step here is total — malformed input is
//! repaired or dropped, never an error.
//!
//! Pipeline order:
//! 1. drop tool-call parts with no matching result in the same message
//! 2. drop messages with no renderable content
//! 3. rewrite file URLs through the attachment map and classify file parts
//! 4. fetch non-image files and inline them (or drop them)
//! 5. re-run the emptiness filter, since step 4 can empty a message

use std::collections::{HashMap, HashSet};

use cr_domain::attachment::{
    is_binary_document, is_image_filename, is_image_media_type, is_textual_media_type,
    media_type_for_filename,
};
use cr_domain::config::FileConfig;
use cr_domain::message::{Message, Part};

/// Run the full normalization pipeline over a turn's history.
pub async fn normalize_turn(
    fetcher: &reqwest::Client,
    files: &FileConfig,
    mut messages: Vec<Message>,
    url_map: &HashMap<String, String>,
) -> Vec<Message> {
    drop_orphaned_tool_calls(&mut messages);
    drop_empty_messages(&mut messages);
    classify_file_parts(&mut messages, url_map);
    inline_non_image_files(fetcher, files, &mut messages).await;
    drop_empty_messages(&mut messages);
    messages
}

/// A tool-call part whose result never arrived is an artifact of an
/// interrupted loop; providers reject it.
pub fn drop_orphaned_tool_calls(messages: &mut [Message]) {
    for msg in messages.iter_mut() {
        // Owned keep-set; computed before the parts list is mutated.
        let result_ids: HashSet<String> = msg
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolResult { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect();
        msg.parts.retain(|p| match p {
            Part::ToolCall { id, .. } => result_ids.contains(id),
            _ => true,
        });
    }
}

pub fn drop_empty_messages(messages: &mut Vec<Message>) {
    messages.retain(Message::is_renderable);
}

/// Rewrite storage URLs via the attachment map and fill in missing image
/// media types from the filename extension. Non-file parts pass through.
pub fn classify_file_parts(messages: &mut [Message], url_map: &HashMap<String, String>) {
    for msg in messages.iter_mut() {
        for part in msg.parts.iter_mut() {
            if let Part::File {
                url,
                media_type,
                filename,
                ..
            } = part
            {
                if let Some(mapped) = url_map.get(url.as_str()) {
                    *url = mapped.clone();
                }
                if media_type.is_none() {
                    if let Some(name) = filename.as_deref() {
                        if let Some(inferred) = media_type_for_filename(name) {
                            *media_type = Some(inferred.to_owned());
                        }
                    }
                }
            }
        }
    }
}

/// What a fetched non-image file part becomes.
///
/// Textual bodies are inlined between file markers; recognized binary
/// documents become a short note; everything else disappears. A missing
/// body means the fetch failed (or blew the size ceiling), and the part
/// is dropped no matter its type.
pub fn classify_fetched(
    media_type: Option<&str>,
    body: Option<&str>,
    name: &str,
) -> Option<Part> {
    let media_type = media_type.unwrap_or("application/octet-stream");
    let body = body?;

    if is_textual_media_type(media_type) {
        return Some(Part::text(file_marker(name, body)));
    }
    if is_binary_document(media_type) {
        return Some(Part::text(format!(
            "[File: {name}] (attached {media_type} document)"
        )));
    }
    None
}

/// Marker framing for inlined file content.
pub fn file_marker(name: &str, body: &str) -> String {
    format!("[File: {name}]\n\n{body}\n\n[End of file: {name}]")
}

/// Fetch every non-image file part and replace it per [`classify_fetched`].
/// Fetch failures drop the part; the turn always proceeds.
async fn inline_non_image_files(
    fetcher: &reqwest::Client,
    files: &FileConfig,
    messages: &mut [Message],
) {
    for msg in messages.iter_mut() {
        let mut replaced: Vec<Option<Part>> = Vec::with_capacity(msg.parts.len());
        for part in msg.parts.drain(..) {
            match part {
                Part::File {
                    url,
                    media_type,
                    filename,
                    size_bytes,
                } => {
                    // Either signal marks an image: a declared media type or
                    // a recognized filename extension.
                    let is_image = media_type.as_deref().is_some_and(is_image_media_type)
                        || filename.as_deref().is_some_and(is_image_filename);
                    if is_image {
                        replaced.push(Some(Part::File {
                            url,
                            media_type,
                            filename,
                            size_bytes,
                        }));
                        continue;
                    }
                    let name = filename
                        .as_deref()
                        .or_else(|| url.rsplit('/').next())
                        .unwrap_or("attachment")
                        .to_owned();
                    let (fetched_type, body) =
                        fetch_body(fetcher, files, &url, media_type.as_deref()).await;
                    replaced.push(classify_fetched(
                        fetched_type.as_deref(),
                        body.as_deref(),
                        &name,
                    ));
                }
                other => replaced.push(Some(other)),
            }
        }
        msg.parts = replaced.into_iter().flatten().collect();
    }
}

/// Fetch a file body, bounded by the configured size ceiling. Returns the
/// effective media type (response header wins over the part's own) and the
/// body when it was retrievable as text.
async fn fetch_body(
    fetcher: &reqwest::Client,
    files: &FileConfig,
    url: &str,
    declared_type: Option<&str>,
) -> (Option<String>, Option<String>) {
    let response = match fetcher.get(url).send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::warn!(url, status = %r.status(), "file fetch failed, dropping part");
            return (declared_type.map(str::to_owned), None);
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "file fetch failed, dropping part");
            return (declared_type.map(str::to_owned), None);
        }
    };

    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_owned());
    let effective = header_type.or_else(|| declared_type.map(str::to_owned));

    if let Some(len) = response.content_length() {
        if len > files.max_fetch_bytes {
            tracing::warn!(url, len, "file exceeds inline ceiling, dropping part");
            return (effective, None);
        }
    }

    match response.text().await {
        Ok(body) if body.len() as u64 <= files.max_fetch_bytes => (effective, Some(body)),
        Ok(_) => (effective, None),
        Err(e) => {
            tracing::warn!(url, error = %e, "reading file body failed, dropping part");
            (effective, None)
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use cr_domain::message::Role;

    fn msg(role: Role, parts: Vec<Part>) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            parts,
        }
    }

    #[test]
    fn orphaned_tool_call_dropped_matched_kept() {
        let mut messages = vec![msg(
            Role::Assistant,
            vec![
                Part::ToolCall {
                    id: "kept".into(),
                    name: "get_weather".into(),
                    args: serde_json::json!({}),
                },
                Part::ToolResult {
                    id: "kept".into(),
                    output: serde_json::json!({"temp_c": 20}),
                },
                Part::ToolCall {
                    id: "orphan".into(),
                    name: "web_search".into(),
                    args: serde_json::json!({}),
                },
            ],
        )];
        drop_orphaned_tool_calls(&mut messages);
        assert_eq!(messages[0].parts.len(), 2);
        assert!(messages[0].parts.iter().all(|p| match p {
            Part::ToolCall { id, .. } | Part::ToolResult { id, .. } => id == "kept",
            _ => false,
        }));
    }

    #[test]
    fn tool_result_without_call_is_kept() {
        // A result on its own still renders; only calls need pairing.
        let mut messages = vec![msg(
            Role::Assistant,
            vec![Part::ToolResult {
                id: "r1".into(),
                output: serde_json::json!(1),
            }],
        )];
        drop_orphaned_tool_calls(&mut messages);
        assert_eq!(messages[0].parts.len(), 1);
    }

    #[test]
    fn empty_messages_dropped() {
        let mut messages = vec![
            msg(Role::User, vec![Part::text("hello")]),
            msg(Role::Assistant, vec![]),
            msg(Role::User, vec![Part::text("  ")]),
        ];
        drop_empty_messages(&mut messages);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn emptiness_filter_is_idempotent() {
        let mut messages = vec![
            msg(Role::User, vec![Part::text("hello")]),
            msg(Role::Assistant, vec![]),
        ];
        drop_empty_messages(&mut messages);
        let once = messages.clone().len();
        drop_empty_messages(&mut messages);
        assert_eq!(messages.len(), once);
    }

    #[test]
    fn image_media_type_filled_from_extension_only() {
        // Everything else about the part must come through unchanged.
        let mut messages = vec![msg(
            Role::User,
            vec![Part::File {
                url: "https://cdn/cat".into(),
                media_type: None,
                filename: Some("cat.png".into()),
                size_bytes: Some(123),
            }],
        )];
        classify_file_parts(&mut messages, &HashMap::new());
        match &messages[0].parts[0] {
            Part::File {
                url,
                media_type,
                filename,
                size_bytes,
            } => {
                assert_eq!(media_type.as_deref(), Some("image/png"));
                assert_eq!(url, "https://cdn/cat");
                assert_eq!(filename.as_deref(), Some("cat.png"));
                assert_eq!(*size_bytes, Some(123));
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn explicit_media_type_not_overwritten() {
        let mut messages = vec![msg(
            Role::User,
            vec![Part::File {
                url: "https://cdn/x".into(),
                media_type: Some("image/webp".into()),
                filename: Some("x.png".into()),
                size_bytes: None,
            }],
        )];
        classify_file_parts(&mut messages, &HashMap::new());
        match &messages[0].parts[0] {
            Part::File { media_type, .. } => {
                assert_eq!(media_type.as_deref(), Some("image/webp"));
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn storage_urls_rewritten_via_map() {
        let mut url_map = HashMap::new();
        url_map.insert(
            "s3://bucket/img.png".to_string(),
            "https://signed/img.png".to_string(),
        );
        let mut messages = vec![msg(
            Role::User,
            vec![Part::File {
                url: "s3://bucket/img.png".into(),
                media_type: Some("image/png".into()),
                filename: None,
                size_bytes: None,
            }],
        )];
        classify_file_parts(&mut messages, &url_map);
        match &messages[0].parts[0] {
            Part::File { url, .. } => assert_eq!(url, "https://signed/img.png"),
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn text_file_inlined_with_markers() {
        let part = classify_fetched(Some("text/plain"), Some("hello"), "doc.txt").unwrap();
        match part {
            Part::Text { text } => {
                assert_eq!(text, "[File: doc.txt]\n\nhello\n\n[End of file: doc.txt]");
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn json_file_inlined() {
        let part =
            classify_fetched(Some("application/json"), Some(r#"{"a":1}"#), "data.json")
                .unwrap();
        assert!(matches!(part, Part::Text { ref text } if text.contains(r#"{"a":1}"#)));
    }

    #[test]
    fn binary_document_becomes_note() {
        let part =
            classify_fetched(Some("application/pdf"), Some("%PDF-1.7 ..."), "report.pdf")
                .unwrap();
        match part {
            Part::Text { text } => {
                assert!(text.starts_with("[File: report.pdf]"));
                assert!(text.contains("application/pdf"));
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn failed_fetch_drops_part_regardless_of_type() {
        // Even a recognized document type yields nothing without a body.
        assert!(classify_fetched(Some("application/pdf"), None, "report.pdf").is_none());
        assert!(classify_fetched(Some("text/plain"), None, "notes.txt").is_none());
    }

    #[test]
    fn unknown_binary_dropped() {
        assert!(
            classify_fetched(Some("application/octet-stream"), Some("\u{0}\u{1}"), "x.bin")
                .is_none()
        );
        assert!(classify_fetched(None, None, "mystery").is_none());
    }

    #[tokio::test]
    async fn image_by_filename_extension_is_not_fetched() {
        // Declared octet-stream, but the extension says image: the part
        // must pass through untouched instead of being fetched and dropped.
        let client = reqwest::Client::new();
        let files = FileConfig::default();
        let messages = vec![msg(
            Role::User,
            vec![Part::File {
                url: "https://cdn/cat".into(),
                media_type: Some("application/octet-stream".into()),
                filename: Some("cat.png".into()),
                size_bytes: None,
            }],
        )];
        let out = normalize_turn(&client, &files, messages, &HashMap::new()).await;
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0].parts[0], Part::File { .. }));
    }
}
