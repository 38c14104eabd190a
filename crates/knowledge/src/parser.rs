//! Source file parsing and text extraction.

use arag_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    PlainText,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
        }
    }
}

/// Parse a source file and extract clean text.
pub fn parse_file(path: &Path) -> AppResult<String> {
    if path.file_name().is_none() {
        return Err(AppError::UnsupportedDocument(format!(
            "{:?} has no file name",
            path
        )));
    }

    let content_type = ContentType::from_path(path).ok_or_else(|| {
        AppError::UnsupportedDocument(format!(
            "{:?}: supported types are .txt, .md, .markdown, .html, .htm",
            path
        ))
    })?;

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    Ok(parse_text(&raw, content_type))
}

/// Extract clean text from already-loaded content.
pub fn parse_text(raw: &str, content_type: ContentType) -> String {
    match content_type {
        ContentType::Markdown => clean_markdown(raw),
        ContentType::Html => clean_html(raw),
        ContentType::PlainText => raw.trim().to_string(),
    }
}

/// Clean markdown by removing excess formatting.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        // Horizontal rules and code fences carry no content
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Clean HTML by stripping tags, scripts, and styles.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut skipping: Option<&str> = None;

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = &text[i..];
            if let Some(closing) = skipping {
                if starts_with_ignore_case(rest, closing) {
                    skipping = None;
                }
            } else if starts_with_ignore_case(rest, "<script") {
                skipping = Some("</script");
            } else if starts_with_ignore_case(rest, "<style") {
                skipping = Some("</style");
            } else {
                // Tags separate words
                result.push(' ');
            }
        } else if ch == '>' {
            in_tag = false;
        } else if !in_tag && skipping.is_none() {
            result.push(ch);
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}
