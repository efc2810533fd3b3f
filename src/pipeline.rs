//! The orchestrator: classify, estimate, then generate/audit until the
//! schedule converges or the attempt budget runs out.
//!
//! State for one end-to-end invocation lives in a private `RunState`; the
//! auditor's feedback is treated as an opaque string that is only ever
//! appended to the constraint text, never parsed. Constraints accumulate
//! within a run and are never retracted.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auditor::{ScheduleAuditor, EMPTY_SCHEDULE_FEEDBACK};
use crate::classifier::{DocumentClassifier, CATCH_ALL};
use crate::dates;
use crate::document::{course_context, SourceDocument};
use crate::error::{Error, Result};
use crate::estimator::WorkloadEstimator;
use crate::generator::ScheduleGenerator;
use crate::llm::{LlmClient, RetryPolicy};
use crate::schedule::{AuditVerdict, Schedule};
use crate::workload::CourseWorkload;

/// Configuration for the orchestration loop.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum generate/audit attempts per run (default: 3).
    pub max_attempts: u32,
    /// Backoff policy for rate-limited estimation calls.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry: RetryPolicy::default(),
        }
    }
}

/// The final record of one run: the schedule that will be rendered plus the
/// verdict it earned. `approved` is false when the attempt budget ran out,
/// and the last rejection reason stays visible in `verdict.feedback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub run_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub attempts: u32,
    pub approved: bool,
    pub verdict: AuditVerdict,
    pub schedule: Schedule,
}

/// Per-run mutable state, owned exclusively by the orchestrator.
struct RunState {
    current_constraints: String,
    workloads: Vec<CourseWorkload>,
    attempt: u32,
    schedule: Schedule,
    verdict: Option<AuditVerdict>,
}

impl RunState {
    fn new(constraints: &str, workloads: Vec<CourseWorkload>) -> Self {
        Self {
            current_constraints: constraints.to_string(),
            workloads,
            attempt: 0,
            schedule: Schedule::empty(),
            verdict: None,
        }
    }

    fn approved(&self) -> bool {
        self.verdict.as_ref().is_some_and(|v| v.valid)
    }
}

/// Drives the full pipeline: classifier, estimator, and the bounded
/// generator/auditor feedback loop.
pub struct Pipeline {
    classifier: DocumentClassifier,
    estimator: WorkloadEstimator,
    generator: ScheduleGenerator,
    auditor: ScheduleAuditor,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self::with_config(client, PipelineConfig::default())
    }

    pub fn with_config(client: Arc<dyn LlmClient>, config: PipelineConfig) -> Self {
        Self {
            classifier: DocumentClassifier::new(client.clone()),
            estimator: WorkloadEstimator::new(client.clone())
                .with_retry_policy(config.retry.clone()),
            generator: ScheduleGenerator::new(client.clone()),
            auditor: ScheduleAuditor::new(client),
            config,
        }
    }

    /// Run the pipeline end to end.
    ///
    /// `today` is the effective current date for the whole run; it anchors
    /// horizon resolution and becomes the schedule's start date.
    #[instrument(skip_all, fields(documents = documents.len(), %today))]
    pub async fn run(
        &self,
        documents: Vec<SourceDocument>,
        hints: Option<&str>,
        constraints: &str,
        end_date: Option<&str>,
        today: NaiveDate,
    ) -> Result<PlanOutcome> {
        if documents.is_empty() {
            return Err(Error::NoDocuments);
        }

        let run_id = Uuid::new_v4();
        let start = today;
        let end = dates::resolve_end_date(today, end_date);
        let end = dates::extend_for_exam_dates(end, today, &documents);
        info!(%run_id, %start, %end, "Planning horizon resolved");

        let buckets = self.classifier.classify(documents, hints).await;

        // The catch-all bucket never becomes a course of its own.
        let courses: Vec<String> = buckets
            .keys()
            .filter(|course| course.as_str() != CATCH_ALL)
            .cloned()
            .collect();
        if courses.is_empty() {
            return Err(Error::NoCourses);
        }
        info!(courses = ?courses, "Courses identified");

        // Sibling context comes from the complete course list, fixed before
        // any estimation call.
        let mut workloads = Vec::with_capacity(courses.len());
        for course in &courses {
            let docs = &buckets[course];
            let context = course_context(docs);
            let workload = self
                .estimator
                .estimate(course, &context, &courses, constraints)
                .await;
            workloads.push(workload);
        }

        let mut state = RunState::new(constraints, workloads);
        let budget = self.config.max_attempts.max(1);

        while state.attempt < budget && !state.approved() {
            state.attempt += 1;
            info!(attempt = state.attempt, budget, "Generation attempt");

            let schedule = self
                .generator
                .generate(&state.workloads, start, end, &state.current_constraints)
                .await;

            // An empty schedule is an automatic audit failure; the auditor
            // is not consulted for it.
            let verdict = if schedule.is_empty() {
                AuditVerdict::rejected(EMPTY_SCHEDULE_FEEDBACK)
            } else {
                self.auditor
                    .audit(&schedule, &state.current_constraints, &state.workloads)
                    .await
            };

            if !verdict.valid {
                state
                    .current_constraints
                    .push_str(&format!(" [CORRECTION: {}]", verdict.feedback));
            }

            state.schedule = schedule;
            state.verdict = Some(verdict);
        }

        let verdict = state
            .verdict
            .unwrap_or_else(|| AuditVerdict::rejected("No generation attempts were made"));
        let approved = verdict.valid;

        if approved {
            info!(attempts = state.attempt, "Run complete, schedule approved");
        } else {
            warn!(
                attempts = state.attempt,
                feedback = %verdict.feedback,
                "Attempt budget exhausted, returning the last schedule unapproved"
            );
        }

        Ok(PlanOutcome {
            run_id,
            start,
            end,
            attempts: state.attempt,
            approved,
            verdict,
            schedule: state.schedule,
        })
    }
}
