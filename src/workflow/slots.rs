//! Candidate and selected sessions for the schedule-creation step.
//!
//! Candidates are grouped by calendar date and one of eight fixed two-hour
//! windows. A selection never holds two sessions on the same (date, start).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};

use super::notices::Notice;
use crate::api::types::{ScheduleEntry, TrainingSession};

const FIRST_SLOT_HOUR: u32 = 6;
const SLOT_WIDTH_HOURS: u32 = 2;

/// One of the eight daily two-hour windows, starting 06:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot(u8);

impl TimeSlot {
    pub const COUNT: u8 = 8;

    pub fn new(index: u8) -> Option<Self> {
        (index < Self::COUNT).then_some(TimeSlot(index))
    }

    pub fn all() -> impl Iterator<Item = TimeSlot> {
        (0..Self::COUNT).map(TimeSlot)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn start(self) -> NaiveTime {
        let hour = FIRST_SLOT_HOUR + SLOT_WIDTH_HOURS * u32::from(self.0);
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn end(self) -> NaiveTime {
        let hour = FIRST_SLOT_HOUR + SLOT_WIDTH_HOURS * (u32::from(self.0) + 1);
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    /// The slot whose start boundary is exactly `time`.
    pub fn starting_at(time: NaiveTime) -> Option<Self> {
        Self::all().find(|slot| slot.start() == time)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start().format("%H:%M"), self.end().format("%H:%M"))
    }
}

/// Candidates on `date` whose start equals the slot's start boundary.
pub fn sessions_for_slot<'a>(
    date: NaiveDate,
    slot: TimeSlot,
    candidates: &'a [TrainingSession],
) -> Vec<&'a TrainingSession> {
    candidates
        .iter()
        .filter(|s| s.calendar_date() == Some(date) && s.start_time() == Some(slot.start()))
        .collect()
}

/// Normalized (date, start) used for slot exclusivity.
/// Falls back to the raw strings when the backend format does not parse.
fn slot_key(session: &TrainingSession) -> (String, String) {
    let date = session
        .calendar_date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| session.date.trim().to_string());
    let start = session
        .start_time()
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| session.start.trim().to_string());
    (date, start)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected,
    Deselected,
    Rejected(Notice),
}

/// Sessions picked for submission, in pick order.
#[derive(Debug, Clone, Default)]
pub struct SlotSelection {
    selected: Vec<TrainingSession>,
}

impl SlotSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, session: &TrainingSession) -> ToggleOutcome {
        if let Some(position) = self.selected.iter().position(|s| s.id == session.id) {
            self.selected.remove(position);
            tracing::debug!(session_id = %session.id, "Session deselected");
            return ToggleOutcome::Deselected;
        }

        let key = slot_key(session);
        if let Some(existing) = self.selected.iter().find(|s| slot_key(s) == key) {
            tracing::info!(
                session_id = %session.id,
                existing_session_id = %existing.id,
                date = %key.0,
                start = %key.1,
                "Rejected second session in an occupied slot"
            );
            return ToggleOutcome::Rejected(Notice::OneSessionPerSlot {
                date: key.0,
                start: key.1,
            });
        }

        self.selected.push(session.clone());
        tracing::debug!(session_id = %session.id, "Session selected");
        ToggleOutcome::Selected
    }

    pub fn remove(&mut self, session_id: &str) -> bool {
        let before = self.selected.len();
        self.selected.retain(|s| s.id != session_id);
        self.selected.len() != before
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.selected.iter().any(|s| s.id == session_id)
    }

    pub fn sessions(&self) -> &[TrainingSession] {
        &self.selected
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn payload(&self) -> Vec<ScheduleEntry> {
        build_schedule_payload(&self.selected)
    }
}

/// Map selected sessions to the `danhSachBuoiTap` entries, values copied verbatim.
pub fn build_schedule_payload(selected: &[TrainingSession]) -> Vec<ScheduleEntry> {
    selected
        .iter()
        .map(|session| ScheduleEntry {
            session_id: session.id.clone(),
            date: session.date.clone(),
            start: session.start.clone(),
            end: session.end.clone(),
            trainer_id: session.trainer.id().to_string(),
        })
        .collect()
}

/// Candidates laid out by day, then slot, for presentation.
#[derive(Debug, Default)]
pub struct SessionBoard<'a> {
    days: BTreeMap<NaiveDate, BTreeMap<TimeSlot, Vec<&'a TrainingSession>>>,
    /// Sessions with an unparseable date or a start off the slot grid.
    pub unslotted: Vec<&'a TrainingSession>,
}

impl<'a> SessionBoard<'a> {
    pub fn build(candidates: &'a [TrainingSession]) -> Self {
        let mut board = SessionBoard::default();
        for session in candidates {
            let placement = session
                .calendar_date()
                .zip(session.start_time().and_then(TimeSlot::starting_at));
            match placement {
                Some((date, slot)) => board
                    .days
                    .entry(date)
                    .or_default()
                    .entry(slot)
                    .or_default()
                    .push(session),
                None => board.unslotted.push(session),
            }
        }
        board
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn sessions(&self, date: NaiveDate, slot: TimeSlot) -> &[&'a TrainingSession] {
        self.days
            .get(&date)
            .and_then(|slots| slots.get(&slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn slots(&self, date: NaiveDate) -> impl Iterator<Item = (TimeSlot, &[&'a TrainingSession])> + '_ {
        self.days
            .get(&date)
            .into_iter()
            .flat_map(|slots| slots.iter().map(|(slot, sessions)| (*slot, sessions.as_slice())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Reference;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn session(id: &str, date: &str, start: &str, end: &str, trainer: &str) -> TrainingSession {
        TrainingSession {
            id: id.to_string(),
            date: date.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            trainer: Reference::Id(trainer.to_string()),
            capacity: 1,
            occupancy: 0,
            title: None,
        }
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn test_time_slot_grid() {
        let slots: Vec<String> = TimeSlot::all().map(|s| s.to_string()).collect();
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0], "06:00-08:00");
        assert_eq!(slots[7], "20:00-22:00");
        assert_eq!(TimeSlot::new(8), None);
        assert_eq!(
            TimeSlot::starting_at(NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
            TimeSlot::new(1)
        );
        assert_eq!(TimeSlot::starting_at(NaiveTime::from_hms_opt(9, 0, 0).unwrap()), None);
    }

    #[test]
    fn test_sessions_for_slot_matches_date_and_start() {
        let candidates = vec![
            session("a", "2024-06-10", "08:00", "10:00", "pt-1"),
            session("b", "2024-06-10T00:00:00.000Z", "08:00:00", "10:00", "pt-2"),
            session("c", "2024-06-10", "10:00", "12:00", "pt-1"),
            session("d", "2024-06-11", "08:00", "10:00", "pt-1"),
        ];
        let slot = TimeSlot::new(1).unwrap();

        let ids: Vec<&str> = sessions_for_slot(june(10), slot, &candidates)
            .iter()
            .map(|s| s.id.as_str())
            .collect();

        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_second_session_in_same_slot_is_rejected() {
        let mut selection = SlotSelection::new();
        let first = session("a", "2024-06-10", "08:00", "10:00", "pt-1");
        let second = session("b", "2024-06-10", "08:00", "10:00", "pt-2");

        assert_eq!(selection.toggle(&first), ToggleOutcome::Selected);
        let outcome = selection.toggle(&second);

        assert_eq!(
            outcome,
            ToggleOutcome::Rejected(Notice::OneSessionPerSlot {
                date: "2024-06-10".to_string(),
                start: "08:00".to_string(),
            })
        );
        assert_eq!(selection.len(), 1);
        assert!(selection.contains("a"));
    }

    #[test]
    fn test_exclusivity_uses_normalized_times() {
        let mut selection = SlotSelection::new();
        selection.toggle(&session("a", "2024-06-10", "08:00", "10:00", "pt-1"));
        let outcome = selection.toggle(&session("b", "2024-06-10T00:00:00Z", "08:00:00", "10:00", "pt-2"));
        assert!(matches!(outcome, ToggleOutcome::Rejected(_)));
    }

    #[test]
    fn test_deselect_frees_the_slot() {
        let mut selection = SlotSelection::new();
        let first = session("a", "2024-06-10", "08:00", "10:00", "pt-1");
        let second = session("b", "2024-06-10", "08:00", "10:00", "pt-2");

        selection.toggle(&first);
        assert_eq!(selection.toggle(&first), ToggleOutcome::Deselected);
        assert_eq!(selection.toggle(&second), ToggleOutcome::Selected);
        assert!(selection.remove("b"));
        assert!(!selection.remove("b"));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_payload_copies_fields_verbatim() {
        let mut selected = session("a", "2024-06-10T00:00:00.000Z", "08:00", "10:00", "unused");
        selected.trainer = Reference::Populated(crate::api::types::PopulatedReference {
            id: "pt-7".to_string(),
            name: Some("Minh".to_string()),
        });

        let payload = build_schedule_payload(&[selected]);

        assert_eq!(
            payload,
            vec![ScheduleEntry {
                session_id: "a".to_string(),
                date: "2024-06-10T00:00:00.000Z".to_string(),
                start: "08:00".to_string(),
                end: "10:00".to_string(),
                trainer_id: "pt-7".to_string(),
            }]
        );
    }

    #[test]
    fn test_payload_has_one_entry_per_selected_session() {
        let mut selection = SlotSelection::new();
        selection.toggle(&session("a", "2024-06-10", "06:00", "08:00", "pt-1"));
        selection.toggle(&session("b", "2024-06-10", "08:00", "10:00", "pt-2"));
        selection.toggle(&session("c", "2024-06-11", "06:00", "08:00", "pt-1"));
        selection.toggle(&session("d", "2024-06-10", "08:00", "10:00", "pt-3"));

        let payload = selection.payload();

        let ids: Vec<&str> = payload.iter().map(|e| e.session_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(payload[1].trainer_id, "pt-2");
        assert_eq!(payload[2].date, "2024-06-11");
    }

    #[test]
    fn test_board_groups_by_day_and_slot() {
        let candidates = vec![
            session("late", "2024-06-11", "18:00", "20:00", "pt-1"),
            session("early", "2024-06-10", "06:00", "08:00", "pt-1"),
            session("twin", "2024-06-10", "06:00", "08:00", "pt-2"),
            session("odd", "2024-06-10", "07:30", "09:30", "pt-2"),
            session("bad", "someday", "06:00", "08:00", "pt-2"),
        ];

        let board = SessionBoard::build(&candidates);

        assert_eq!(board.dates().collect::<Vec<_>>(), vec![june(10), june(11)]);
        assert_eq!(board.sessions(june(10), TimeSlot::new(0).unwrap()).len(), 2);
        assert_eq!(board.sessions(june(11), TimeSlot::new(6).unwrap())[0].id, "late");
        assert!(board.sessions(june(12), TimeSlot::new(0).unwrap()).is_empty());
        assert_eq!(board.slots(june(10)).count(), 1);
        let unslotted: Vec<&str> = board.unslotted.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(unslotted, vec!["odd", "bad"]);
    }

    fn candidate_pool() -> Vec<TrainingSession> {
        let mut pool = Vec::new();
        for (day_index, day) in ["2024-06-10", "2024-06-11"].iter().enumerate() {
            for slot in TimeSlot::all().take(3) {
                for trainer in 0..3 {
                    pool.push(session(
                        &format!("s{day_index}-{}-{trainer}", slot.index()),
                        day,
                        &slot.start().format("%H:%M").to_string(),
                        &slot.end().format("%H:%M").to_string(),
                        &format!("pt-{trainer}"),
                    ));
                }
            }
        }
        pool
    }

    proptest! {
        #[test]
        fn prop_selection_never_shares_a_slot(picks in proptest::collection::vec(0usize..18, 0..40)) {
            let pool = candidate_pool();
            let mut selection = SlotSelection::new();

            for pick in picks {
                let before = selection.sessions().to_vec();
                let outcome = selection.toggle(&pool[pick]);
                if matches!(outcome, ToggleOutcome::Rejected(_)) {
                    prop_assert_eq!(selection.sessions(), before.as_slice());
                }

                let keys: HashSet<(String, String)> = selection.sessions().iter().map(slot_key).collect();
                prop_assert_eq!(keys.len(), selection.len());
            }
        }

        #[test]
        fn prop_double_toggle_restores_membership(
            setup in proptest::collection::vec(0usize..18, 0..10),
            pick in 0usize..18,
        ) {
            let pool = candidate_pool();
            let mut selection = SlotSelection::new();
            for index in setup {
                selection.toggle(&pool[index]);
            }
            let before: Vec<String> = selection.sessions().iter().map(|s| s.id.clone()).collect();

            let first = selection.toggle(&pool[pick]);
            let second = selection.toggle(&pool[pick]);
            let after: Vec<String> = selection.sessions().iter().map(|s| s.id.clone()).collect();

            if matches!(first, ToggleOutcome::Rejected(_)) {
                prop_assert!(matches!(second, ToggleOutcome::Rejected(_)));
            }
            let mut before_sorted = before.clone();
            let mut after_sorted = after.clone();
            before_sorted.sort();
            after_sorted.sort();
            prop_assert_eq!(before_sorted, after_sorted);
        }

        #[test]
        fn prop_payload_mirrors_selection(picks in proptest::collection::vec(0usize..18, 0..40)) {
            let pool = candidate_pool();
            let mut selection = SlotSelection::new();
            for pick in picks {
                selection.toggle(&pool[pick]);
            }

            let payload = selection.payload();

            prop_assert_eq!(payload.len(), selection.len());
            for (entry, session) in payload.iter().zip(selection.sessions()) {
                prop_assert_eq!(&entry.session_id, &session.id);
                prop_assert_eq!(&entry.date, &session.date);
                prop_assert_eq!(&entry.start, &session.start);
                prop_assert_eq!(&entry.end, &session.end);
                prop_assert_eq!(entry.trainer_id.as_str(), session.trainer.id());
            }
        }
    }
}
