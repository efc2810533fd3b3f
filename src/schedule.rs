//! Calendar types: events, day plans, schedules, and audit verdicts.
//!
//! These are the wire types exchanged with the generation service and
//! persisted as the structured run output, so all of them round-trip
//! through serde without loss.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Category tag for a schedule event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// First-exposure study of new material.
    Study,
    /// Review, practice, or consolidation.
    Review,
    /// Meals.
    Meal,
    /// Sleep, routines, breaks.
    #[serde(alias = "break")]
    Personal,
    /// Anything the generator tags outside the known vocabulary.
    #[serde(other)]
    Other,
}

impl EventKind {
    /// Whether this event counts toward a day's study load.
    pub fn is_study_work(self) -> bool {
        matches!(self, Self::Study | Self::Review)
    }
}

/// A time interval within one day.
///
/// Zero-duration markers ("begin sleep") carry no end time. The wire form
/// is the human one: `"08:00 - 10:00"` for spans, `"01:00"` for instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: Option<NaiveTime>,
}

impl TimeSlot {
    /// A slot spanning `start..end`.
    pub fn span(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// A zero-duration marker at `start`.
    pub fn instant(start: NaiveTime) -> Self {
        Self { start, end: None }
    }

    /// Duration in hours; instants are zero. A span whose end reads earlier
    /// than its start is taken to cross midnight.
    pub fn duration_hours(&self) -> f64 {
        match self.end {
            Some(end) => {
                let minutes = (end - self.start).num_minutes();
                let minutes = if minutes < 0 { minutes + 24 * 60 } else { minutes };
                minutes as f64 / 60.0
            }
            None => 0.0,
        }
    }

    /// Parse the wire form: `"HH:MM - HH:MM"` or `"HH:MM"`.
    pub fn parse(text: &str) -> Result<Self> {
        let parse_time = |s: &str| {
            NaiveTime::parse_from_str(s.trim(), "%H:%M")
                .map_err(|e| Error::malformed_schedule(format!("bad time '{}': {}", s.trim(), e)))
        };

        match text.split_once('-') {
            Some((start, end)) => Ok(Self::span(parse_time(start)?, parse_time(end)?)),
            None => Ok(Self::instant(parse_time(text)?)),
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{} - {}", self.start.format("%H:%M"), end.format("%H:%M")),
            None => write!(f, "{}", self.start.format("%H:%M")),
        }
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(D::Error::custom)
    }
}

/// A single time-blocked calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    #[serde(rename = "time")]
    pub slot: TimeSlot,
    pub task: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
}

impl ScheduleEvent {
    pub fn new(slot: TimeSlot, task: impl Into<String>, kind: EventKind) -> Self {
        Self {
            slot,
            task: task.into(),
            kind,
        }
    }
}

/// One calendar day's ordered events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    #[serde(rename = "day_name")]
    pub weekday: String,
    pub events: Vec<ScheduleEvent>,
}

impl DayPlan {
    /// Create a day plan for `date`, deriving the weekday label.
    pub fn new(date: NaiveDate, events: Vec<ScheduleEvent>) -> Self {
        Self {
            date,
            weekday: date.format("%A").to_string(),
            events,
        }
    }

    /// Hours of study-type work (study + review) scheduled this day.
    pub fn study_hours(&self) -> f64 {
        self.events
            .iter()
            .filter(|e| e.kind.is_study_work())
            .map(|e| e.slot.duration_hours())
            .sum()
    }
}

/// A full day-by-day calendar for one planning range.
///
/// Each generator call produces a wholly new schedule; prior ones are
/// superseded, never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(rename = "schedule")]
    pub days: Vec<DayPlan>,
}

impl Schedule {
    /// The degraded output of a failed generation call.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Whether any event label mentions the given course code, ignoring
    /// case and internal whitespace ("MATH138" matches "MATH 138: Series").
    pub fn mentions_course(&self, code: &str) -> bool {
        let needle = squash(code);
        if needle.is_empty() {
            return false;
        }
        self.days
            .iter()
            .flat_map(|d| &d.events)
            .any(|e| squash(&e.task).contains(&needle))
    }

    /// Order each day's events by start time.
    pub fn sort_events(&mut self) {
        for day in &mut self.days {
            day.events.sort_by_key(|e| e.slot.start);
        }
    }
}

/// Uppercase with whitespace removed, for course-mention matching.
pub(crate) fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// The auditor's judgement of one generated schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditVerdict {
    /// Whether the schedule passed the audit.
    pub valid: bool,
    /// Free-form feedback; when invalid, specific enough to be forwarded
    /// verbatim as correction text to the next generation attempt.
    pub feedback: String,
}

impl AuditVerdict {
    pub fn approved(feedback: impl Into<String>) -> Self {
        Self {
            valid: true,
            feedback: feedback.into(),
        }
    }

    pub fn rejected(feedback: impl Into<String>) -> Self {
        Self {
            valid: false,
            feedback: feedback.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_time_slot_parse_span() {
        let slot = TimeSlot::parse("08:00 - 10:30").unwrap();
        assert_eq!(slot, TimeSlot::span(t(8, 0), t(10, 30)));
        assert_eq!(slot.to_string(), "08:00 - 10:30");
        assert_eq!(slot.duration_hours(), 2.5);
    }

    #[test]
    fn test_time_slot_parse_instant() {
        let slot = TimeSlot::parse("01:00").unwrap();
        assert_eq!(slot, TimeSlot::instant(t(1, 0)));
        assert_eq!(slot.to_string(), "01:00");
        assert_eq!(slot.duration_hours(), 0.0);
    }

    #[test]
    fn test_time_slot_crossing_midnight() {
        let slot = TimeSlot::parse("23:00 - 01:00").unwrap();
        assert_eq!(slot.duration_hours(), 2.0);
    }

    #[test]
    fn test_time_slot_rejects_garbage() {
        assert!(TimeSlot::parse("noon").is_err());
        assert!(TimeSlot::parse("25:00").is_err());
        assert!(TimeSlot::parse("08:00 - later").is_err());
    }

    #[test]
    fn test_event_kind_aliases() {
        let kind: EventKind = serde_json::from_str("\"break\"").unwrap();
        assert_eq!(kind, EventKind::Personal);

        // Unknown tags degrade to Other rather than failing the whole parse.
        let kind: EventKind = serde_json::from_str("\"wake\"").unwrap();
        assert_eq!(kind, EventKind::Other);
    }

    #[test]
    fn test_day_plan_weekday_label() {
        let day = DayPlan::new(NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(), vec![]);
        assert_eq!(day.weekday, "Tuesday");
    }

    #[test]
    fn test_day_plan_study_hours() {
        let day = DayPlan::new(
            NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
            vec![
                ScheduleEvent::new(
                    TimeSlot::span(t(8, 0), t(10, 0)),
                    "MATH 138: Integrals",
                    EventKind::Study,
                ),
                ScheduleEvent::new(TimeSlot::span(t(12, 0), t(13, 0)), "LUNCH", EventKind::Meal),
                ScheduleEvent::new(
                    TimeSlot::span(t(14, 0), t(15, 30)),
                    "MATH 138: Review",
                    EventKind::Review,
                ),
                ScheduleEvent::new(TimeSlot::instant(t(23, 0)), "SLEEP", EventKind::Personal),
            ],
        );
        assert_eq!(day.study_hours(), 3.5);
    }

    #[test]
    fn test_mentions_course_ignores_spacing_and_case() {
        let schedule = Schedule {
            days: vec![DayPlan::new(
                NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
                vec![ScheduleEvent::new(
                    TimeSlot::span(t(8, 0), t(9, 0)),
                    "math138: practice problems",
                    EventKind::Study,
                )],
            )],
        };
        assert!(schedule.mentions_course("MATH 138"));
        assert!(!schedule.mentions_course("PHYS 234"));
    }

    #[test]
    fn test_sort_events_orders_by_start() {
        let mut schedule = Schedule {
            days: vec![DayPlan::new(
                NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
                vec![
                    ScheduleEvent::new(TimeSlot::instant(t(23, 0)), "SLEEP", EventKind::Personal),
                    ScheduleEvent::new(TimeSlot::span(t(8, 0), t(9, 0)), "A", EventKind::Study),
                ],
            )],
        };
        schedule.sort_events();
        assert_eq!(schedule.days[0].events[0].task, "A");
    }

    #[test]
    fn test_schedule_wire_shape() {
        let schedule = Schedule {
            days: vec![DayPlan::new(
                NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
                vec![ScheduleEvent::new(
                    TimeSlot::span(t(7, 0), t(8, 0)),
                    "Morning Routine",
                    EventKind::Personal,
                )],
            )],
        };

        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(
            json["schedule"][0]["events"][0]["time"],
            "07:00 - 08:00"
        );
        assert_eq!(json["schedule"][0]["events"][0]["type"], "personal");
        assert_eq!(json["schedule"][0]["day_name"], "Tuesday");
    }

    fn time_strategy() -> impl Strategy<Value = NaiveTime> {
        (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn slot_strategy() -> impl Strategy<Value = TimeSlot> {
        (time_strategy(), proptest::option::of(time_strategy()))
            .prop_map(|(start, end)| TimeSlot { start, end })
    }

    fn kind_strategy() -> impl Strategy<Value = EventKind> {
        prop_oneof![
            Just(EventKind::Study),
            Just(EventKind::Review),
            Just(EventKind::Meal),
            Just(EventKind::Personal),
            Just(EventKind::Other),
        ]
    }

    fn event_strategy() -> impl Strategy<Value = ScheduleEvent> {
        (slot_strategy(), "[A-Z]{2,4} [0-9]{3}: [a-z ]{0,12}", kind_strategy())
            .prop_map(|(slot, task, kind)| ScheduleEvent { slot, task, kind })
    }

    fn day_strategy() -> impl Strategy<Value = DayPlan> {
        (
            (2024i32..2028, 1u32..13, 1u32..29),
            proptest::collection::vec(event_strategy(), 0..6),
        )
            .prop_map(|((y, m, d), events)| {
                DayPlan::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), events)
            })
    }

    proptest! {
        #[test]
        fn prop_schedule_round_trips(days in proptest::collection::vec(day_strategy(), 0..5)) {
            let schedule = Schedule { days };
            let json = serde_json::to_string(&schedule).unwrap();
            let parsed: Schedule = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, schedule);
        }
    }
}
