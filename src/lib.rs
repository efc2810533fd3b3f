//! # finalai-core
//!
//! Multi-agent orchestration for turning a pile of course material into a
//! personalized, auditor-approved study calendar.
//!
//! ## Core Components
//!
//! - **Classifier**: groups source documents into course categories
//! - **Estimator**: converts each course's material into estimated work items
//! - **Generator**: fits the full workload into a day-by-day calendar
//! - **Auditor**: validates the calendar and produces corrective feedback
//! - **Pipeline**: drives the stages and the bounded generate/audit loop
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use finalai_core::{
//!     load_documents, ClientConfig, GoogleClient, Pipeline, PlainTextExtractor,
//! };
//!
//! let client = Arc::new(GoogleClient::new(ClientConfig::new(api_key)));
//! let documents = load_documents(&course_dir, &PlainTextExtractor)?;
//!
//! let pipeline = Pipeline::new(client);
//! let outcome = pipeline
//!     .run(documents, Some("MATH 138, HIST 200"), "no study after 9pm", None, today)
//!     .await?;
//!
//! println!("{}", finalai_core::render_markdown(&outcome));
//! ```

pub mod auditor;
pub mod classifier;
pub mod dates;
pub mod document;
pub mod error;
pub mod estimator;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod render;
pub mod schedule;
pub mod workload;

// Re-exports for convenience
pub use auditor::{ScheduleAuditor, EMPTY_SCHEDULE_FEEDBACK};
pub use classifier::{DocumentClassifier, CATCH_ALL};
pub use dates::{extend_for_exam_dates, resolve_end_date, DEFAULT_HORIZON_DAYS};
pub use document::{
    course_context, load_documents, PlainTextExtractor, SourceDocument, TextExtractor,
    ASSIGN_SNIPPET_CHARS, HEADER_SNIPPET_CHARS,
};
pub use error::{Error, Result};
pub use estimator::{WorkloadEstimator, FALLBACK_HOURS, MAX_CONTEXT_CHARS};
pub use generator::{
    ScheduleGenerator, CHUNK_SPLIT_HOURS, MAX_DAILY_STUDY_HOURS, REVIEW_BUFFER_HOURS,
};
pub use llm::{
    complete_with_retry, ChatMessage, ChatRole, ClientConfig, CompletionRequest,
    CompletionResponse, GoogleClient, LlmClient, RetryPolicy, StopReason, TokenUsage,
};
pub use pipeline::{Pipeline, PipelineConfig, PlanOutcome};
pub use render::{read_outcome, render_markdown, write_outputs};
pub use schedule::{AuditVerdict, DayPlan, EventKind, Schedule, ScheduleEvent, TimeSlot};
pub use workload::{total_hours, CourseWorkload, WorkItem, MIN_ITEM_HOURS};
