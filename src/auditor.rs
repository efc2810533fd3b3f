//! Schedule auditor: validates a generated schedule against the original
//! requirements.
//!
//! Coverage is the one check that must never be missed, so it runs as plain
//! code before any model call: an empty schedule and a schedule missing a
//! required course are both rejected deterministically. The softer checks
//! (burnout, distribution, sleep window, user constraints) go to the model,
//! and a failure of that call fails open rather than blocking the pipeline.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::llm::{extract_json_object, ChatMessage, CompletionRequest, LlmClient};
use crate::schedule::{AuditVerdict, Schedule};
use crate::workload::{self, CourseWorkload};

/// Fixed feedback for the empty-schedule short-circuit.
pub const EMPTY_SCHEDULE_FEEDBACK: &str = "CRITICAL: the generated schedule was empty.";

const SYSTEM_PROMPT: &str = "\
You are an expert Audit & Compliance AI.
Your goal is to validate a study schedule against the original requirements and human limitations.

**YOUR AUDIT CHECKLIST:**
1.  USER CONSTRAINTS: check strictly against the user rules (e.g., \"No Fridays\", \"Wake up at 11am\").

2.  HUMAN FACTORS (the smell test):
    - Burnout: are there days with more than 10 hours of work?
    - Logic: is a hard course crammed entirely into the last 2 days? (bad distribution)
    - Sleep: are tasks scheduled between 00:00 and 06:00 (unless the user asked for a night-owl schedule)?

**OUTPUT FORMAT:**
Return a JSON object:
{
  \"valid\": boolean,
  \"feedback\": \"string\"
}

**FEEDBACK RULES:**
- If valid: \"Approved. The plan covers all courses and respects user constraints.\"
- If invalid: be specific and name the violated rule, e.g. \"REJECTED: three study blocks run past midnight. Move them earlier.\"";

/// Validates schedules and produces actionable feedback.
pub struct ScheduleAuditor {
    client: Arc<dyn LlmClient>,
}

impl ScheduleAuditor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Audit `schedule` against the fixed requirements record.
    #[instrument(skip_all, fields(days = schedule.days.len()))]
    pub async fn audit(
        &self,
        schedule: &Schedule,
        constraints: &str,
        workloads: &[CourseWorkload],
    ) -> AuditVerdict {
        if schedule.is_empty() {
            return AuditVerdict::rejected(EMPTY_SCHEDULE_FEEDBACK);
        }

        let missing = missing_courses(schedule, workloads);
        if !missing.is_empty() {
            let feedback = format!(
                "REJECTED: the schedule never covers {}. Every required course must appear; add study blocks for it.",
                missing.join(", ")
            );
            info!(missing = ?missing, "Coverage check failed");
            return AuditVerdict::rejected(feedback);
        }

        let request = CompletionRequest::new()
            .with_system(SYSTEM_PROMPT)
            .with_message(ChatMessage::user(user_prompt(
                schedule,
                constraints,
                workloads,
            )))
            .with_json_output(true);

        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Audit call failed, approving by default");
                return AuditVerdict::approved(
                    "Approved by default: the audit service was unavailable.",
                );
            }
        };

        match parse_verdict(&response.content) {
            Some(verdict) => {
                if verdict.valid {
                    info!("Schedule approved");
                } else {
                    info!(feedback = %verdict.feedback, "Audit failed");
                }
                verdict
            }
            None => {
                warn!("Audit response was malformed, approving by default");
                AuditVerdict::approved(
                    "Approved by default: the audit response was unreadable.",
                )
            }
        }
    }
}

/// Required courses with no mention anywhere in the schedule's event labels.
pub(crate) fn missing_courses(schedule: &Schedule, workloads: &[CourseWorkload]) -> Vec<String> {
    workloads
        .iter()
        .filter(|w| !schedule.mentions_course(&w.course))
        .map(|w| w.course.clone())
        .collect()
}

fn user_prompt(schedule: &Schedule, constraints: &str, workloads: &[CourseWorkload]) -> String {
    let required: Vec<&str> = workloads.iter().map(|w| w.course.as_str()).collect();
    let total_hours = workload::total_hours(workloads);

    // The model only needs dates and "time - task" lines, not the full
    // event objects.
    let minified: Vec<_> = schedule
        .days
        .iter()
        .map(|day| {
            json!({
                "date": day.date.to_string(),
                "events": day
                    .events
                    .iter()
                    .map(|e| format!("{} - {}", e.slot, e.task))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    let minified = serde_json::to_string_pretty(&minified).unwrap_or_default();

    let constraints = if constraints.trim().is_empty() {
        "None"
    } else {
        constraints
    };

    format!(
        "--- REQUIREMENTS (INPUT) ---\n\
         REQUIRED COURSES: {}\n\
         TOTAL ESTIMATED WORKLOAD: {total_hours:.1} hours\n\
         USER CONSTRAINTS: \"{constraints}\"\n\n\
         --- PROPOSED PLAN (OUTPUT) ---\n{minified}\n\n\
         --- MISSION ---\n\
         Audit this plan.\n\
         1. Is the schedule biologically realistic?\n\
         2. Did it follow the user constraints?",
        required.join(", ")
    )
}

#[derive(Debug, Deserialize)]
struct VerdictWire {
    #[serde(default)]
    valid: bool,
    #[serde(default = "default_feedback")]
    feedback: String,
}

fn default_feedback() -> String {
    "Unknown audit outcome".to_string()
}

fn parse_verdict(text: &str) -> Option<AuditVerdict> {
    let json = extract_json_object(text)?;
    let wire: VerdictWire = serde_json::from_str(json).ok()?;
    Some(AuditVerdict {
        valid: wire.valid,
        feedback: wire.feedback,
    })
}
