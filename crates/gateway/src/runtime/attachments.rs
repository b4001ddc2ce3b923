//! Attachment resolution.
//!
//! Every storage-scheme attachment is exchanged for a presigned URL before
//! the turn proceeds; plain HTTP(S) attachments pass through untouched.
//! Resolution is all-or-nothing: one failure rejects the whole turn with
//! the display names of everything that failed, so the client can show the
//! user exactly which files to retry.

use std::collections::HashMap;

use futures_util::future::join_all;

use cr_domain::attachment::{AttachmentInput, ResolvedAttachment};
use cr_domain::config::FileConfig;
use cr_domain::error::{Error, Result};

use crate::signing::UrlSigner;

/// Successful resolution of a full attachment set.
#[derive(Debug)]
pub struct ResolutionOutcome {
    pub attachments: Vec<ResolvedAttachment>,
    /// original URL → presigned URL, for rewriting file parts in history.
    /// Pass-through URLs are not included.
    pub url_map: HashMap<String, String>,
}

pub async fn resolve_attachments(
    signer: &dyn UrlSigner,
    files: &FileConfig,
    inputs: &[AttachmentInput],
) -> Result<ResolutionOutcome> {
    // Size ceiling applies before any network call.
    for input in inputs {
        if let Some(size) = input.size_bytes {
            if size > files.max_attachment_bytes {
                return Err(Error::FileTooLarge {
                    name: input.display_name().to_owned(),
                    size_bytes: size,
                    limit_bytes: files.max_attachment_bytes,
                });
            }
        }
    }

    let resolutions = join_all(inputs.iter().map(|input| resolve_one(signer, input))).await;

    let failed: Vec<String> = resolutions
        .iter()
        .filter(|r| !r.valid)
        .map(|r| r.name.clone())
        .collect();
    if !failed.is_empty() {
        tracing::warn!(failed = ?failed, "attachment resolution rejected the turn");
        return Err(Error::FileAccess { failed });
    }

    let url_map = resolutions
        .iter()
        .filter(|r| r.resolved_url.as_deref() != Some(r.original_url.as_str()))
        .filter_map(|r| {
            r.resolved_url
                .clone()
                .map(|resolved| (r.original_url.clone(), resolved))
        })
        .collect();

    Ok(ResolutionOutcome {
        attachments: resolutions,
        url_map,
    })
}

async fn resolve_one(signer: &dyn UrlSigner, input: &AttachmentInput) -> ResolvedAttachment {
    let name = input.display_name().to_owned();

    let resolved_url = if input.needs_signing() {
        match signer.presign(&input.url).await {
            Ok(url) if !url.is_empty() => Some(url),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "presigning failed");
                None
            }
        }
    } else {
        Some(input.url.clone())
    };

    let valid = resolved_url.is_some();
    ResolvedAttachment {
        original_url: input.url.clone(),
        resolved_url,
        name,
        media_type: input.media_type.clone(),
        size_bytes: input.size_bytes,
        valid,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
