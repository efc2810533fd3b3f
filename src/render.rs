//! Rendering and persistence of run outcomes.
//!
//! Two artifacts per run: a machine-parseable JSON record that round-trips
//! back into the same [`PlanOutcome`], and a human-readable markdown plan
//! with the audit banner on top. The banner never hides an audit failure.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::pipeline::PlanOutcome;
use crate::schedule::EventKind;

fn icon(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Study => "📚",
        EventKind::Review => "🧠",
        EventKind::Meal => "🍽️",
        EventKind::Personal => "🛌",
        EventKind::Other => "☕",
    }
}

fn kind_label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Study => "STUDY",
        EventKind::Review => "REVIEW",
        EventKind::Meal => "MEAL",
        EventKind::Personal => "PERSONAL",
        EventKind::Other => "OTHER",
    }
}

/// Render the outcome as a markdown study plan.
pub fn render_markdown(outcome: &PlanOutcome) -> String {
    let mut md = String::from("# 📅 Final Exam Study Plan\n\n");

    md.push_str("### 🛡️ Auditor Report\n");
    let status_icon = if outcome.approved { "✅" } else { "⚠️" };
    md.push_str(&format!(
        "> {} **STATUS:** {}\n\n---\n",
        status_icon, outcome.verdict.feedback
    ));

    if outcome.schedule.is_empty() {
        md.push_str("No schedule generated.\n");
        return md;
    }

    for day in &outcome.schedule.days {
        md.push_str(&format!("## {}, {}\n", day.weekday, day.date));
        md.push_str("| Time | Type | Task |\n| :--- | :--- | :--- |\n");

        for event in &day.events {
            md.push_str(&format!(
                "| **{}** | {} {} | {} |\n",
                event.slot,
                icon(event.kind),
                kind_label(event.kind),
                event.task
            ));
        }
        md.push_str("\n---\n\n");
    }

    md
}

/// Write the markdown plan and the structured JSON record.
pub fn write_outputs(outcome: &PlanOutcome, md_path: &Path, json_path: &Path) -> Result<()> {
    fs::write(md_path, render_markdown(outcome))?;
    info!(path = %md_path.display(), "Wrote markdown plan");

    fs::write(json_path, serde_json::to_string_pretty(outcome)?)?;
    info!(path = %json_path.display(), "Wrote structured record");
    Ok(())
}

/// Re-parse a persisted structured record.
pub fn read_outcome(json_path: &Path) -> Result<PlanOutcome> {
    let raw = fs::read_to_string(json_path)?;
    Ok(serde_json::from_str(&raw)?)
}
