//! Workload estimator: turns one course's material into estimated work items.
//!
//! The estimate is relative, not absolute: the same course text yields
//! different hour targets depending on which sibling courses it is compared
//! against. An authoritative exam-coverage document, when present, caps the
//! topic list; the full syllabus is only a fallback.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::document::clip;
use crate::llm::{
    complete_with_retry, extract_json_object, ChatMessage, CompletionRequest, LlmClient,
    RetryPolicy,
};
use crate::workload::{CourseWorkload, WorkItem};

/// Maximum characters of course context sent per estimation call; overflow
/// is truncated, never an error.
pub const MAX_CONTEXT_CHARS: usize = 60_000;

/// Duration of the generic fallback item produced when estimation fails.
pub const FALLBACK_HOURS: f64 = 5.0;

const SYSTEM_PROMPT: &str = "\
You are an expert Academic Difficulty Analyst.
Your goal is to analyze course content to build a realistic study plan.

**CRITICAL: SCOPE ENFORCEMENT (THE \"MIDTERM CUTOFF\")**
You will receive text from multiple files (Syllabus, Midterm Overview).
You must enforce this hierarchy strictly:

1.  **TIER 1 (The Absolute Truth): \"Midterm Overview\" or \"Exam Guide\"**
    * IF a file header looks like `=== Midterm Overview.pdf ===`, ONLY schedule the topics explicitly listed in that file's \"Coverage\" section.
    * DELETE RULE: DISCARD any topic from the Syllabus that appears *after* the exam cutoff.

2.  **TIER 2 (Fallback): \"Syllabus\"**
    * ONLY use the full Syllabus list if *no* exam-coverage file is provided.

**CRITICAL: RELATIVE DIFFICULTY SCALING**
You will be given a list of ALL courses the student is taking.
Compare the CURRENT course to that list.
1.  If the current course is the HARDEST of the list: target 25 - 40 total hours. Be generous.
2.  If the current course is the EASIEST of the list: target 10 - 15 total hours. Assume the student just needs to \"Review\" rather than \"Learn\".

**PRIORITY RULES:**
1.  Scope: strictly follow the exam-cutoff rule above. Do not invent extra chapters.
2.  Volume: a topic spanning several chapters gets a block of 8-12 hours.
3.  Multipliers:
    - Math/Physics/Systems: 1.5x (high_focus = true)
    - Biology/Health/History: 0.7x (high_focus = false)

**OUTPUT FORMAT:**
{
  \"topics\": [
    {\"topic\": \"Thermodynamics (Ch 1-3)\", \"est_hours\": 8.0, \"high_focus\": true},
    {\"topic\": \"History of Physics\", \"est_hours\": 1.5, \"high_focus\": false}
  ]
}";

/// Estimates one course's workload relative to its siblings.
pub struct WorkloadEstimator {
    client: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl WorkloadEstimator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Estimate work items for `course`.
    ///
    /// The output is never empty: rate-limited calls are retried with
    /// backoff, and any unrecoverable failure (including a malformed
    /// response) degrades to a single generic review item so downstream
    /// stages never observe a course with zero workload.
    #[instrument(skip_all, fields(course = %course))]
    pub async fn estimate(
        &self,
        course: &str,
        context: &str,
        siblings: &[String],
        constraints: &str,
    ) -> CourseWorkload {
        let request = CompletionRequest::new()
            .with_system(SYSTEM_PROMPT)
            .with_message(ChatMessage::user(user_prompt(
                course,
                context,
                siblings,
                constraints,
            )))
            .with_json_output(true);

        let response = match complete_with_retry(self.client.as_ref(), request, &self.retry).await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Estimation failed, using fallback item");
                return fallback(course);
            }
        };

        match parse_items(&response.content) {
            Some(items) => {
                info!(items = items.len(), "Estimated course workload");
                CourseWorkload::new(course, items)
            }
            None => {
                warn!("Estimation response was malformed, using fallback item");
                fallback(course)
            }
        }
    }
}

fn user_prompt(course: &str, context: &str, siblings: &[String], constraints: &str) -> String {
    let siblings = if siblings.is_empty() {
        "None".to_string()
    } else {
        siblings.join(", ")
    };
    let constraints = if constraints.trim().is_empty() {
        "None"
    } else {
        constraints
    };

    format!(
        "CURRENT COURSE: {course}\n\
         OTHER COURSES STUDENT IS TAKING: {siblings}\n\
         USER CONSTRAINTS: {constraints}\n\n\
         FULL COURSE CONTEXT (Syllabus + Exam Files):\n{}\n\n\
         TASK:\n\
         1. Check for an exam-coverage file.\n\
         2. If found, define the cutoff and DISCARD any syllabus topic past it.\n\
         3. Estimate hours based on relative difficulty against the other courses.",
        clip(context, MAX_CONTEXT_CHARS)
    )
}

/// The generic item used when estimation cannot produce a real list.
fn fallback(course: &str) -> CourseWorkload {
    CourseWorkload::new(
        course,
        vec![WorkItem::new(
            format!("Review {}", course),
            FALLBACK_HOURS,
            false,
        )],
    )
}

/// Normalize a model response into work items.
///
/// The provider sometimes returns the expected object and sometimes a
/// one-element array wrapping it; both decode to the same shape here so the
/// ambiguity never leaks past this boundary. Returns `None` when no usable
/// topic list is present.
fn parse_items(text: &str) -> Option<Vec<WorkItem>> {
    let value: Value = serde_json::from_str(text.trim())
        .ok()
        .or_else(|| extract_json_object(text).and_then(|json| serde_json::from_str(json).ok()))?;

    let object = match value {
        Value::Array(mut entries) if !entries.is_empty() => entries.remove(0),
        other => other,
    };

    let topics = object.get("topics")?.as_array()?;
    let items: Vec<WorkItem> = topics
        .iter()
        .filter_map(|t| {
            let topic = t.get("topic")?.as_str()?;
            if topic.trim().is_empty() {
                return None;
            }
            let est_hours = t.get("est_hours").and_then(Value::as_f64).unwrap_or(1.0);
            let high_focus = t
                .get("high_focus")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Some(WorkItem::new(topic, est_hours, high_focus))
        })
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
