//! Schedule generator: fits the full workload into a day-by-day calendar.
//!
//! The prompt contract carries the scheduling heuristics (biological
//! skeleton, review buffer, chunking, interleaving, user-constraint
//! precedence). The feasibility pre-check is not a heuristic: whenever the
//! requested hours arithmetically exceed the daily ceiling, a strict
//! load-shedding instruction block is injected, independent of anything the
//! model might do.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::llm::{extract_json_object, ChatMessage, CompletionRequest, LlmClient};
use crate::schedule::Schedule;
use crate::workload::{self, CourseWorkload};

/// Hard ceiling on scheduled study hours per day once the safety valve
/// triggers.
pub const MAX_DAILY_STUDY_HOURS: f64 = 9.0;

/// Work items longer than this must be split into separated blocks.
pub const CHUNK_SPLIT_HOURS: f64 = 2.5;

/// Window before the end date reserved exclusively for review.
pub const REVIEW_BUFFER_HOURS: u32 = 48;

fn system_prompt() -> String {
    format!(
        "\
You are an expert Time-Blocking Scheduler.
Your goal is to fit ALL provided study tasks into the calendar.

**CRITICAL PRIORITY 1: BIOLOGICAL SKELETON (MANDATORY)**
Every single day object in your JSON output MUST explicitly include these 4 anchors.
DO NOT SKIP THEM TO SAVE SPACE, EVEN ON THE LAST DAY.
1.  Morning Routine (e.g., 07:00 - 08:00)
2.  LUNCH (e.g., 12:00 - 13:00)
3.  DINNER (e.g., 18:00 - 19:00)
4.  SLEEP (e.g., 23:00)
Also insert a short recovery break after every 1.5 - 2 hours of continuous study.

**CRITICAL PRIORITY 2: COURSE COVERAGE**
1.  YOU MUST SCHEDULE TASKS FOR EVERY SINGLE COURSE LISTED.
2.  If a course is missing from the output, you have FAILED.
3.  It is better to squeeze the schedule (reduce breaks) than to skip a course.

**HIERARCHY OF RULES:**
1.  USER CONSTRAINTS (MUST LISTEN AT ALL TIMES): e.g. \"Wake up at 10am\" overrides everything below.
2.  MANDATORY CONTENT: all courses must appear in the schedule.
3.  REVIEW BUFFER: no new content in the last {REVIEW_BUFFER_HOURS} hours (review only).
4.  BIOLOGICAL DEFAULTS: sleep ~23:00 to 07:00, morning routine for an hour after waking, lunch ~12:00, dinner ~18:00.

**CHUNKING LOGIC:**
- Split big tasks: if a task needs more than {CHUNK_SPLIT_HOURS} hours, split it into blocks separated by other activities, never back-to-back.
- Interleaving: alternate subjects rather than batching one course all day.

**OUTPUT FORMAT:**
{{
  \"schedule\": [
    {{
        \"date\": \"2026-02-24\",
        \"day_name\": \"Tuesday\",
        \"events\": [
            {{\"time\": \"07:00 - 08:00\", \"task\": \"Morning Routine\", \"type\": \"personal\"}},
            {{\"time\": \"08:00 - 10:00\", \"task\": \"PHYS 234: Quantum States\", \"type\": \"study\"}},
            {{\"time\": \"12:00 - 13:00\", \"task\": \"LUNCH\", \"type\": \"meal\"}},
            {{\"time\": \"23:00\", \"task\": \"SLEEP\", \"type\": \"personal\"}}
        ]
    }}
  ]
}}"
    )
}

/// Produces a fresh schedule for the full workload and date range.
pub struct ScheduleGenerator {
    client: Arc<dyn LlmClient>,
}

impl ScheduleGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Generate a schedule covering `[start, end]` inclusive.
    ///
    /// Callers resolve invalid or past end dates before calling. Any call
    /// or decode failure degrades to [`Schedule::empty`], which the
    /// orchestrator treats as an automatic audit failure.
    #[instrument(skip_all, fields(start = %start, end = %end))]
    pub async fn generate(
        &self,
        workloads: &[CourseWorkload],
        start: NaiveDate,
        end: NaiveDate,
        constraints: &str,
    ) -> Schedule {
        let days = days_in_range(start, end);
        let total_hours = workload::total_hours(workloads);

        let safety = safety_instruction(total_hours, days);
        if safety.is_some() {
            warn!(
                total_hours,
                days,
                daily_avg = total_hours / days as f64,
                "Workload exceeds daily ceiling, injecting strict limits"
            );
        }

        let request = CompletionRequest::new()
            .with_system(system_prompt())
            .with_message(ChatMessage::user(user_prompt(
                workloads,
                start,
                end,
                days,
                constraints,
                safety.as_deref(),
            )))
            .with_json_output(true);

        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Schedule generation call failed");
                return Schedule::empty();
            }
        };

        match parse_schedule(&response.content) {
            Ok(mut schedule) => {
                if safety.is_some() {
                    enforce_daily_cap(&mut schedule);
                }
                info!(days = schedule.days.len(), "Generated schedule");
                schedule
            }
            Err(e) => {
                warn!(error = %e, "Schedule response was unparseable");
                Schedule::empty()
            }
        }
    }
}

/// Trim each day's study blocks down to [`MAX_DAILY_STUDY_HOURS`].
///
/// Runs only when the safety valve has triggered, so a compliant model
/// response passes through untouched. Non-study events are never dropped.
fn enforce_daily_cap(schedule: &mut Schedule) {
    for day in &mut schedule.days {
        let mut budget = MAX_DAILY_STUDY_HOURS;
        let before = day.events.len();
        day.events.retain(|event| {
            if !event.kind.is_study_work() {
                return true;
            }
            let hours = event.slot.duration_hours();
            if hours <= budget {
                budget -= hours;
                true
            } else {
                false
            }
        });
        if day.events.len() < before {
            warn!(date = %day.date, dropped = before - day.events.len(), "Capped daily study load");
        }
    }
}

/// Inclusive day count of the planning range.
pub(crate) fn days_in_range(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(0) + 1
}

/// The deterministic safety valve.
///
/// Returns the load-shedding instruction block exactly when the requested
/// daily average exceeds [`MAX_DAILY_STUDY_HOURS`].
pub(crate) fn safety_instruction(total_hours: f64, days: i64) -> Option<String> {
    let daily_avg = total_hours / days.max(1) as f64;
    if daily_avg <= MAX_DAILY_STUDY_HOURS {
        return None;
    }

    Some(format!(
        "**CRITICAL RESOURCE WARNING**\n\
         The user has {total_hours:.1} hours of work but only {days} days.\n\
         This averages to {daily_avg:.1} hours/day, which is not sustainable.\n\n\
         **UPDATED STRATEGY:**\n\
         1.  CAP DAILY STUDY AT {MAX_DAILY_STUDY_HOURS:.0} HOURS MAX. Do not schedule more, even if tasks are left over.\n\
         2.  Triaging: prioritize high_focus tasks.\n\
         3.  Review tasks: cut review time in half to save space."
    ))
}

fn user_prompt(
    workloads: &[CourseWorkload],
    start: NaiveDate,
    end: NaiveDate,
    days: i64,
    constraints: &str,
    safety: Option<&str>,
) -> String {
    let mut tasks_summary = String::new();
    for workload in workloads {
        tasks_summary.push_str(&format!("\nCOURSE: {}\n", workload.course));
        for item in &workload.items {
            tasks_summary.push_str(&format!(
                " - {} (Need: {}h) [High Focus: {}]\n",
                item.topic, item.est_hours, item.high_focus
            ));
        }
    }

    let constraints = if constraints.trim().is_empty() {
        "None"
    } else {
        constraints
    };

    format!(
        "CURRENT DATE: {start}\n\
         PLANNING RANGE: {start} to {end} ({days} days)\n\n\
         *** USER CUSTOMIZATION ***:\n\
         \"{constraints}\"\n\
         (NOTE: these constraints override your default sleep/meal times!)\n\n\
         TASKS TO SCHEDULE:\n{tasks_summary}\n\
         {}\n\n\
         ACTION:\n\
         Create the schedule.\n\
         CRITICAL: the last 2 days of the plan are review only (the review buffer).\n\
         MANDATORY: include Morning Routine, Lunch, Dinner, and Sleep for EVERY day \
         from day 1 to day {days}. Do not get lazy at the end.",
        safety.unwrap_or("")
    )
}

/// Decode a model response into a schedule; no partial-parse recovery.
fn parse_schedule(text: &str) -> Result<Schedule> {
    let json = extract_json_object(text)
        .ok_or_else(|| Error::malformed_schedule("no JSON object in response"))?;
    let mut schedule: Schedule = serde_json::from_str(json)?;
    schedule.sort_events();
    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockClient;
    use crate::workload::WorkItem;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn workloads(hours: f64) -> Vec<CourseWorkload> {
        vec![CourseWorkload::new(
            "MATH 138",
            vec![WorkItem::new("Integrals", hours, true)],
        )]
    }

    #[test]
    fn test_days_in_range_is_inclusive() {
        assert_eq!(days_in_range(date(2026, 3, 1), date(2026, 3, 10)), 10);
        assert_eq!(days_in_range(date(2026, 3, 1), date(2026, 3, 1)), 1);
    }

    #[test]
    fn test_safety_valve_triggers_on_arithmetic_alone() {
        // 90h over 10 days = 9.0/day: at the ceiling, no trigger.
        assert!(safety_instruction(90.0, 10).is_none());
        // 95h over 10 days = 9.5/day: must trigger.
        let instruction = safety_instruction(95.0, 10).unwrap();
        assert!(instruction.contains("CAP DAILY STUDY AT 9 HOURS MAX"));
        assert!(instruction.contains("9.5 hours/day"));
    }

    #[test]
    fn test_safety_valve_handles_degenerate_day_count() {
        assert!(safety_instruction(20.0, 0).is_some());
    }

    #[tokio::test]
    async fn test_generate_parses_fenced_json() {
        let client = Arc::new(MockClient::new());
        client.push_ok(
            "```json\n{\"schedule\": [{\"date\": \"2026-03-01\", \"day_name\": \"Sunday\", \
             \"events\": [{\"time\": \"08:00 - 10:00\", \"task\": \"MATH 138: Integrals\", \
             \"type\": \"study\"}]}]}\n```",
        );

        let generator = ScheduleGenerator::new(client);
        let schedule = generator
            .generate(&workloads(8.0), date(2026, 3, 1), date(2026, 3, 10), "")
            .await;

        assert_eq!(schedule.days.len(), 1);
        assert!(schedule.mentions_course("MATH 138"));
    }

    #[tokio::test]
    async fn test_generate_degrades_to_empty_on_call_failure() {
        let client = Arc::new(MockClient::new());
        client.push_err("service down");

        let generator = ScheduleGenerator::new(client);
        let schedule = generator
            .generate(&workloads(8.0), date(2026, 3, 1), date(2026, 3, 10), "")
            .await;

        assert!(schedule.is_empty());
    }

    #[tokio::test]
    async fn test_generate_degrades_to_empty_on_unparseable_output() {
        let client = Arc::new(MockClient::new());
        client.push_ok("I could not produce a schedule, sorry.");

        let generator = ScheduleGenerator::new(client);
        let schedule = generator
            .generate(&workloads(8.0), date(2026, 3, 1), date(2026, 3, 10), "")
            .await;

        assert!(schedule.is_empty());
    }

    #[tokio::test]
    async fn test_overloaded_run_caps_each_day_at_the_ceiling() {
        // 120h over 10 days trips the valve; the model response ignores the
        // cap and packs 12 study hours into one day.
        let client = Arc::new(MockClient::new());
        client.push_ok(
            "{\"schedule\": [{\"date\": \"2026-03-01\", \"day_name\": \"Sunday\", \"events\": [\
             {\"time\": \"08:00 - 12:00\", \"task\": \"MATH 138: Integrals\", \"type\": \"study\"},\
             {\"time\": \"12:00 - 13:00\", \"task\": \"LUNCH\", \"type\": \"meal\"},\
             {\"time\": \"13:00 - 17:00\", \"task\": \"MATH 138: Series\", \"type\": \"study\"},\
             {\"time\": \"17:00 - 21:00\", \"task\": \"MATH 138: Practice\", \"type\": \"review\"}\
             ]}]}",
        );

        let generator = ScheduleGenerator::new(client);
        let schedule = generator
            .generate(&workloads(120.0), date(2026, 3, 1), date(2026, 3, 10), "")
            .await;

        assert!(schedule.days[0].study_hours() <= MAX_DAILY_STUDY_HOURS);
        // The meal anchor survives the trim.
        assert!(schedule.days[0].events.iter().any(|e| e.task == "LUNCH"));
    }

    #[tokio::test]
    async fn test_feasible_run_is_not_capped() {
        let client = Arc::new(MockClient::new());
        client.push_ok(
            "{\"schedule\": [{\"date\": \"2026-03-01\", \"day_name\": \"Sunday\", \"events\": [\
             {\"time\": \"08:00 - 18:00\", \"task\": \"MATH 138: Marathon\", \"type\": \"study\"}\
             ]}]}",
        );

        let generator = ScheduleGenerator::new(client);
        let schedule = generator
            .generate(&workloads(8.0), date(2026, 3, 1), date(2026, 3, 10), "")
            .await;

        // Feasible totals leave the model's output alone; the auditor owns
        // burnout complaints in that regime.
        assert_eq!(schedule.days[0].study_hours(), 10.0);
    }

    #[tokio::test]
    async fn test_safety_block_reaches_prompt_when_overloaded() {
        let client = Arc::new(MockClient::new());
        client.push_ok(r#"{"schedule": []}"#);

        let generator = ScheduleGenerator::new(client.clone());
        generator
            .generate(&workloads(120.0), date(2026, 3, 1), date(2026, 3, 10), "")
            .await;

        let prompt = client.prompt_text(0);
        assert!(prompt.contains("CRITICAL RESOURCE WARNING"));
        assert!(prompt.contains("CAP DAILY STUDY"));
    }

    #[tokio::test]
    async fn test_no_safety_block_when_feasible() {
        let client = Arc::new(MockClient::new());
        client.push_ok(r#"{"schedule": []}"#);

        let generator = ScheduleGenerator::new(client.clone());
        generator
            .generate(&workloads(20.0), date(2026, 3, 1), date(2026, 3, 10), "")
            .await;

        let prompt = client.prompt_text(0);
        assert!(!prompt.contains("CRITICAL RESOURCE WARNING"));
    }

    #[tokio::test]
    async fn test_constraints_and_tasks_reach_prompt() {
        let client = Arc::new(MockClient::new());
        client.push_ok(r#"{"schedule": []}"#);

        let generator = ScheduleGenerator::new(client.clone());
        generator
            .generate(
                &workloads(8.0),
                date(2026, 3, 1),
                date(2026, 3, 10),
                "no study after 9pm",
            )
            .await;

        let prompt = client.prompt_text(0);
        assert!(prompt.contains("no study after 9pm"));
        assert!(prompt.contains("COURSE: MATH 138"));
        assert!(prompt.contains("Integrals (Need: 8h)"));
        assert!(prompt.contains("(10 days)"));
    }
}
