use crate::domain::models::Entry;

/// Todo view of one day: done and pending all-day entries, each sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoState {
    pub done: Vec<Entry>,
    pub pending: Vec<Entry>,
}

impl TodoState {
    /// First pending entry whose name contains `needle`.
    pub fn find_pending(&self, needle: &str) -> Option<&Entry> {
        first_match(&self.pending, needle)
    }

    /// First done entry whose name contains `needle`.
    pub fn find_done(&self, needle: &str) -> Option<&Entry> {
        first_match(&self.done, needle)
    }

    /// First match across both groups, done entries searched first.
    pub fn find_any(&self, needle: &str) -> Option<&Entry> {
        self.find_done(needle).or_else(|| self.find_pending(needle))
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty() && self.pending.is_empty()
    }
}

/// Keeps whole-day entries only and splits them by tag.
///
/// Service order is preserved between entries sharing a name.
pub fn classify(entries: Vec<Entry>) -> TodoState {
    let (mut done, mut pending): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .filter(Entry::is_all_day)
        .partition(|entry| entry.tag.is_done());
    done.sort_by(|left, right| left.name().cmp(right.name()));
    pending.sort_by(|left, right| left.name().cmp(right.name()));
    TodoState { done, pending }
}

/// Case-sensitive substring match; the first hit in `entries` order wins.
pub fn first_match<'a>(entries: &'a [Entry], needle: &str) -> Option<&'a Entry> {
    entries.iter().find(|entry| entry.name().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EventTime, Tag};
    use chrono::{DateTime, NaiveDate};
    use proptest::prelude::*;
    use serde_json::Map;

    fn day() -> NaiveDate {
        NaiveDate::parse_from_str("2026-02-16", "%Y-%m-%d").expect("valid date")
    }

    fn all_day(id: &str, name: &str, tag: Tag) -> Entry {
        let mut entry = Entry::all_day(id, name, day());
        entry.tag = tag;
        entry
    }

    fn timed(id: &str, name: &str) -> Entry {
        let at = |value: &str| EventTime::DateTime {
            at: DateTime::parse_from_rfc3339(value).expect("valid datetime"),
            time_zone: None,
        };
        Entry {
            id: id.to_string(),
            summary: Some(name.to_string()),
            start: at("2026-02-16T10:00:00-05:00"),
            end: at("2026-02-16T11:00:00-05:00"),
            tag: Tag::Absent,
            extra: Map::new(),
        }
    }

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(Entry::name).collect()
    }

    #[test]
    fn classify_example_day() {
        let state = classify(vec![
            all_day("1", "Buy milk", Tag::Absent),
            all_day("2", "Gym", Tag::Done),
            timed("3", "Call Bob"),
        ]);

        assert_eq!(names(&state.done), vec!["Gym"]);
        assert_eq!(names(&state.pending), vec!["Buy milk"]);
    }

    #[test]
    fn other_colors_count_as_pending() {
        let state = classify(vec![all_day("1", "Paint", Tag::Other("3".to_string()))]);
        assert!(state.done.is_empty());
        assert_eq!(names(&state.pending), vec!["Paint"]);
    }

    #[test]
    fn entry_with_one_timed_side_is_excluded() {
        let mut mixed = all_day("1", "Half", Tag::Absent);
        mixed.end = timed("x", "x").end;
        assert!(classify(vec![mixed]).is_empty());
    }

    #[test]
    fn first_match_wins_when_several_names_match() {
        let state = classify(vec![
            all_day("1", "milk b", Tag::Absent),
            all_day("2", "milk a", Tag::Absent),
        ]);
        let found = state.find_pending("milk").expect("match");
        assert_eq!(found.id, "2");
    }

    #[test]
    fn matching_is_case_sensitive() {
        let state = classify(vec![all_day("1", "Buy milk", Tag::Absent)]);
        assert!(state.find_pending("Milk").is_none());
        assert!(state.find_pending("milk").is_some());
    }

    #[test]
    fn find_any_prefers_done_entries() {
        let state = classify(vec![
            all_day("1", "Gym pending", Tag::Absent),
            all_day("2", "Gym done", Tag::Done),
        ]);
        assert_eq!(state.find_any("Gym").map(|entry| entry.id.as_str()), Some("2"));
    }

    fn arb_entry() -> impl Strategy<Value = Entry> {
        (
            "[a-c]{0,2}",
            prop_oneof![
                Just(Tag::Done),
                Just(Tag::Absent),
                "[0-9]{1,2}".prop_map(Tag::Other),
            ],
            any::<bool>(),
        )
            .prop_map(|(name, tag, is_all_day)| {
                let mut entry = if is_all_day {
                    all_day("", &name, Tag::Absent)
                } else {
                    timed("", &name)
                };
                entry.tag = tag;
                entry
            })
    }

    fn arb_entries() -> impl Strategy<Value = Vec<Entry>> {
        prop::collection::vec(arb_entry(), 0..24).prop_map(|mut entries| {
            for (index, entry) in entries.iter_mut().enumerate() {
                entry.id = format!("evt-{index}");
            }
            entries
        })
    }

    proptest! {
        #[test]
        fn partitions_are_exactly_the_all_day_entries(entries in arb_entries()) {
            let expected_ids = entries
                .iter()
                .filter(|entry| entry.is_all_day())
                .map(|entry| entry.id.clone())
                .collect::<std::collections::BTreeSet<_>>();
            let state = classify(entries);

            let mut seen = std::collections::BTreeSet::new();
            for entry in state.done.iter().chain(state.pending.iter()) {
                prop_assert!(seen.insert(entry.id.clone()), "duplicate {}", entry.id);
            }
            prop_assert_eq!(seen, expected_ids);
        }

        #[test]
        fn partition_is_decided_by_tag_alone(entries in arb_entries()) {
            let state = classify(entries);
            prop_assert!(state.done.iter().all(|entry| entry.tag == Tag::Done));
            prop_assert!(state.pending.iter().all(|entry| entry.tag != Tag::Done));
            prop_assert!(state.done.iter().chain(state.pending.iter()).all(Entry::is_all_day));
        }

        #[test]
        fn partitions_are_sorted_and_stable(entries in arb_entries()) {
            let position = |id: &str| id.trim_start_matches("evt-").parse::<usize>().unwrap_or(0);
            let state = classify(entries);
            for group in [&state.done, &state.pending] {
                for pair in group.windows(2) {
                    prop_assert!(pair[0].name() <= pair[1].name());
                    if pair[0].name() == pair[1].name() {
                        prop_assert!(position(&pair[0].id) < position(&pair[1].id));
                    }
                }
            }
        }
    }
}
