//! Document classifier: groups source documents into course categories.
//!
//! Classification happens in two passes. First a single model call derives
//! candidate course codes (with short topic summaries) from the document
//! headers, biased toward user hints but requiring textual evidence. Then
//! every document is assigned to exactly one candidate: an exact
//! code-in-filename match wins outright, otherwise a content-similarity
//! model call decides, and anything unconvincing lands in the catch-all
//! bucket.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::document::SourceDocument;
use crate::llm::{extract_json_object, ChatMessage, CompletionRequest, LlmClient};
use crate::schedule::squash;

/// Reserved bucket for documents no candidate matches convincingly.
pub const CATCH_ALL: &str = "General";

/// Groups source documents into named course categories.
pub struct DocumentClassifier {
    client: Arc<dyn LlmClient>,
}

impl DocumentClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Partition `documents` into course buckets.
    ///
    /// Every input document appears in exactly one output bucket. Candidate
    /// derivation failure degrades to an empty candidate set (everything
    /// routes to [`CATCH_ALL`]) rather than raising.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn classify(
        &self,
        documents: Vec<SourceDocument>,
        hints: Option<&str>,
    ) -> BTreeMap<String, Vec<SourceDocument>> {
        let candidates = self.derive_candidates(&documents, hints).await;
        info!(candidates = candidates.len(), "Identified course candidates");

        let mut buckets: BTreeMap<String, Vec<SourceDocument>> = BTreeMap::new();
        for doc in documents {
            let course = self.assign(&doc, &candidates).await;
            debug!(filename = %doc.filename, course = %course, "Assigned document");
            buckets.entry(course).or_default().push(doc);
        }
        buckets
    }

    /// Derive `{course code -> topic summary}` candidates from document
    /// headers. Any failure yields an empty map; this is a local degrade,
    /// not a fatal error.
    async fn derive_candidates(
        &self,
        documents: &[SourceDocument],
        hints: Option<&str>,
    ) -> BTreeMap<String, String> {
        let request = CompletionRequest::new()
            .with_message(ChatMessage::user(candidate_prompt(documents, hints)))
            .with_json_output(true);

        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Could not auto-detect courses, defaulting to catch-all");
                return BTreeMap::new();
            }
        };

        match extract_json_object(&response.content)
            .and_then(|json| serde_json::from_str::<BTreeMap<String, String>>(json).ok())
        {
            Some(candidates) => candidates,
            None => {
                warn!("Course candidate response was malformed, defaulting to catch-all");
                BTreeMap::new()
            }
        }
    }

    /// Assign one document to a candidate course, or to [`CATCH_ALL`].
    async fn assign(
        &self,
        doc: &SourceDocument,
        candidates: &BTreeMap<String, String>,
    ) -> String {
        if candidates.is_empty() {
            return CATCH_ALL.to_string();
        }

        // A course code literally embedded in the filename settles it.
        let squashed_name = squash(&doc.filename);
        for code in candidates.keys() {
            if squashed_name.contains(&squash(code)) {
                return code.clone();
            }
        }

        let request = CompletionRequest::new()
            .with_message(ChatMessage::user(assignment_prompt(doc, candidates)));

        match self.client.complete(request).await {
            Ok(response) => {
                let cleaned = response.content.trim().replace(['"', '\''], "");
                if candidates.contains_key(&cleaned) {
                    cleaned
                } else {
                    CATCH_ALL.to_string()
                }
            }
            Err(e) => {
                warn!(filename = %doc.filename, error = %e, "Assignment call failed");
                CATCH_ALL.to_string()
            }
        }
    }
}

fn candidate_prompt(documents: &[SourceDocument], hints: Option<&str>) -> String {
    let mut bulk_text = String::new();
    for (idx, doc) in documents.iter().enumerate() {
        bulk_text.push_str(&format!("--- FILE {}: {} ---\n", idx, doc.filename));
        bulk_text.push_str(doc.header_snippet());
        bulk_text.push_str("\n\n");
    }

    let hint_text = match hints {
        Some(hints) if !hints.trim().is_empty() => format!(
            "USER HINT: The user indicated they are likely taking these courses: [{}]. \
             Use this list to guide your search, but ONLY output courses if you find \
             actual evidence (syllabi/files) for them.\n\n",
            hints.trim()
        ),
        _ => String::new(),
    };

    format!(
        "You are an Academic File Organizer.\n\
         Scan the file headers below.\n\
         Identify the distinct COURSE CODES and their TOPICS.\n\n\
         {hint_text}\
         CRITICAL INSTRUCTION:\n\
         1. Prioritize Syllabi/Course Outlines to find the source.\n\
         2. Extract the Course Code (e.g. CS 101, HLTH 204, PHYS 234) and a short Topic Summary.\n\
         3. If a course has multiple sections or similar names, use the topic to distinguish them.\n\n\
         OUTPUT FORMAT:\n\
         Return valid JSON only. Key = Course Code, Value = Short Topic Summary.\n\n\
         EXAMPLE OUTPUT:\n\
         {{\n  \"MATH 138\": \"Calculus II, Integrals, Series\",\n  \"HIST 200\": \"Modern History, Cold War, WWII\"\n}}\n\n\
         FILES CONTENT:\n{bulk_text}"
    )
}

fn assignment_prompt(doc: &SourceDocument, candidates: &BTreeMap<String, String>) -> String {
    let known = candidates
        .iter()
        .map(|(code, topic)| format!("  {}: {}", code, topic))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Task: Match the document below to the correct Course Code.\n\n\
         KNOWN COURSES & TOPICS:\n{known}\n\n\
         NEW FILE TO SORT:\n\
         Filename: {}\n\
         Content Snippet: {}\n\n\
         INSTRUCTIONS:\n\
         1. ANALYZE THE TOPIC: Read the content snippet.\n\
         2. MATCH THE TOPIC: Pick the known course whose topics best fit the content.\n\
         3. MATCH THE FILENAME: Generic names like \"Midterm 1\" go to the best topic match.\n\
         4. BE AGGRESSIVE: Do not return \"{CATCH_ALL}\" unless the file is completely \
         unrelated to every course. If it looks even slightly like one of them, match it.\n\n\
         OUTPUT:\n\
         Return ONLY the Course Code string.",
        doc.filename,
        doc.assignment_snippet()
    )
}
