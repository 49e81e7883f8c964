//! Document fix-up and context formatting.
//!
//! Retrieved chunks may carry their citation inline as a
//! `Reference URL: ...` line instead of a `url` metadata field. Before a
//! document reaches the answerer that line is lifted into `metadata.url`
//! and removed from the text, and documents still lacking a URL get the
//! configured fallback.

use crate::models::Document;

/// Citation used when a document carries no URL of its own.
pub const DEFAULT_FALLBACK_URL: &str = "https://docs.apostrophecms.org/";

const REFERENCE_PREFIX: &str = "Reference URL:";

/// Remove every line starting with `Reference URL:` from
/// `doc.page_content`. Indented or quoted occurrences are ordinary text.
///
/// The first non-empty reference becomes `metadata.url` unless the
/// document already has a URL.
pub fn extract_reference_url(doc: &mut Document) {
    if !doc.page_content.contains(REFERENCE_PREFIX) {
        return;
    }

    let mut reference: Option<String> = None;
    let mut kept: Vec<&str> = Vec::new();
    let mut removed = false;
    for line in doc.page_content.lines() {
        match line.strip_prefix(REFERENCE_PREFIX) {
            Some(rest) => {
                removed = true;
                let rest = rest.trim();
                if reference.is_none() && !rest.is_empty() {
                    reference = Some(rest.to_string());
                }
            }
            None => kept.push(line),
        }
    }
    if !removed {
        return;
    }
    let stripped = kept.join("\n");

    doc.page_content = stripped;
    if let Some(url) = reference {
        if doc.url().is_none() {
            doc.set_url(url);
        }
    }
}

/// Apply reference extraction and the fallback URL to every document.
pub fn prepare_documents(docs: Vec<Document>, fallback_url: &str) -> Vec<Document> {
    docs.into_iter()
        .map(|mut doc| {
            extract_reference_url(&mut doc);
            if doc.url().is_none() {
                doc.set_url(fallback_url);
            }
            doc
        })
        .collect()
}

/// `{page_content}\nURL: {url}` for one document.
pub fn format_document(doc: &Document) -> String {
    format!(
        "{}\nURL: {}",
        doc.page_content,
        doc.url().unwrap_or(DEFAULT_FALLBACK_URL)
    )
}

/// All documents formatted and separated by blank lines.
pub fn context_block(docs: &[Document]) -> String {
    docs.iter()
        .map(format_document)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Distinct citation URLs in retrieval order.
pub fn source_urls(docs: &[Document]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for url in docs.iter().filter_map(|d| d.url()) {
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}
