//! Work items and per-course workloads.

use serde::{Deserialize, Serialize};

/// Floor applied to estimated durations so no item ever carries a
/// non-positive number of hours.
pub const MIN_ITEM_HOURS: f64 = 0.25;

/// A single estimated study task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Topic label, e.g. "Thermodynamics (Ch 1-3)".
    pub topic: String,
    /// Estimated duration in hours; always strictly positive.
    pub est_hours: f64,
    /// Whether this topic demands high-focus study blocks.
    pub high_focus: bool,
}

impl WorkItem {
    /// Create a work item, clamping the duration to [`MIN_ITEM_HOURS`] when
    /// it is non-positive or not finite.
    pub fn new(topic: impl Into<String>, est_hours: f64, high_focus: bool) -> Self {
        let est_hours = if est_hours.is_finite() && est_hours > 0.0 {
            est_hours
        } else {
            MIN_ITEM_HOURS
        };
        Self {
            topic: topic.into(),
            est_hours,
            high_focus,
        }
    }
}

/// One course's identifier paired with its ordered work items.
///
/// The full set of workloads for a run is the canonical requirements record:
/// it stays constant across every generate/audit iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseWorkload {
    pub course: String,
    pub items: Vec<WorkItem>,
}

impl CourseWorkload {
    pub fn new(course: impl Into<String>, items: Vec<WorkItem>) -> Self {
        Self {
            course: course.into(),
            items,
        }
    }

    /// Sum of estimated hours across this course's items.
    pub fn total_hours(&self) -> f64 {
        self.items.iter().map(|i| i.est_hours).sum()
    }
}

/// Sum of estimated hours across all courses.
pub fn total_hours(workloads: &[CourseWorkload]) -> f64 {
    workloads.iter().map(|w| w.total_hours()).sum()
}
