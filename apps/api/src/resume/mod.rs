//! Resume text extraction: turns an uploaded PDF into the plain-text
//! summary that interview prompts carry under `Resume Summary:`.

use axum::{extract::Multipart, Json};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;

/// Upload limit for the extract route.
pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;
const SUMMARY_MAX_CHARS: usize = 1500;

#[derive(Debug, Serialize)]
pub struct ResumeExtractResponse {
    pub text: String,
    pub summary: String,
}

/// POST /api/zuri/resume/extract (multipart, field `file`)
pub async fn handle_extract(mut multipart: Multipart) -> Result<Json<ResumeExtractResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("could not read upload: {e}")))?;
        if !bytes.starts_with(b"%PDF") {
            return Err(AppError::Validation("file must be a PDF".to_string()));
        }

        let size = bytes.len();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?
            .map_err(|e| {
                warn!("PDF extraction failed: {e}");
                AppError::Validation("could not read text from PDF".to_string())
            })?;

        let text = collapse_whitespace(&text);
        if text.is_empty() {
            return Err(AppError::Validation(
                "PDF contains no extractable text".to_string(),
            ));
        }
        info!("Extracted {} chars from {size}-byte resume", text.len());

        let summary = summarize(&text, SUMMARY_MAX_CHARS);
        return Ok(Json(ResumeExtractResponse { text, summary }));
    }

    Err(AppError::Validation("missing 'file' field".to_string()))
}

/// Collapses runs of whitespace within lines and drops blank lines.
pub fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncates to at most `max_chars` characters including the trailing `…`,
/// preferring a word boundary in the second half of the kept text.
pub fn summarize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let cut: Vec<char> = text.chars().take(keep).collect();
    let end = match cut.iter().rposition(|c| c.is_whitespace()) {
        Some(pos) if pos > keep / 2 => pos,
        _ => keep,
    };
    let kept: String = cut[..end].iter().collect();
    format!("{}…", kept.trim_end())
}
