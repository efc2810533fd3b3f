//! Source documents and the text-extraction seam.
//!
//! Documents reach the pipeline reduced to a filename plus extracted text.
//! The extraction itself (PDF parsing in particular) is an external
//! collaborator behind the [`TextExtractor`] trait; the built-in extractor
//! only handles plain-text files.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Characters of a document used when deriving course candidates.
pub const HEADER_SNIPPET_CHARS: usize = 2000;

/// Characters of a document used when matching it to a known course.
pub const ASSIGN_SNIPPET_CHARS: usize = 10_000;

/// A source document reduced to filename + extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name without directory components.
    pub filename: String,
    /// Extracted text content.
    pub text: String,
}

impl SourceDocument {
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
        }
    }

    /// Leading slice of the text used for course-candidate derivation.
    pub fn header_snippet(&self) -> &str {
        clip(&self.text, HEADER_SNIPPET_CHARS)
    }

    /// Leading slice of the text used for course assignment.
    pub fn assignment_snippet(&self) -> &str {
        clip(&self.text, ASSIGN_SNIPPET_CHARS)
    }
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub(crate) fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Extracts plain text from a source file.
///
/// PDF extraction plugs in here; implementations report which paths they
/// can handle via [`TextExtractor::supports`].
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor can handle the given path.
    fn supports(&self, path: &Path) -> bool;

    /// Extract the full text of the file at `path`.
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Extractor for plain-text course material (`.txt`, `.md`).
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("txt") | Some("md")
        )
    }

    fn extract(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }
}

/// Load every supported document in `dir`.
///
/// Files the extractor cannot read are skipped with a warning, as are files
/// whose extracted text is empty; finding no usable documents at all is
/// fatal. The result is sorted by filename so downstream stages iterate
/// deterministically.
pub fn load_documents(dir: &Path, extractor: &dyn TextExtractor) -> Result<Vec<SourceDocument>> {
    let mut documents = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !extractor.supports(&path) {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        match extractor.extract(&path) {
            Ok(text) if !text.trim().is_empty() => {
                debug!(filename = %filename, chars = text.len(), "Loaded document");
                documents.push(SourceDocument::new(filename, text));
            }
            Ok(_) => {
                warn!(filename = %filename, "Document extracted to empty text, skipping");
            }
            Err(e) => {
                warn!(filename = %filename, error = %e, "Failed to extract document, skipping");
            }
        }
    }

    if documents.is_empty() {
        return Err(Error::NoDocuments);
    }

    documents.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(documents)
}

/// Frame each document's text under a `=== filename ===` header, the shape
/// the workload estimator expects its course context in.
pub fn course_context(documents: &[SourceDocument]) -> String {
    let mut context = String::new();
    for doc in documents {
        context.push_str(&format!("\n=== {} ===\n{}\n", doc.filename, doc.text));
    }
    context
}
