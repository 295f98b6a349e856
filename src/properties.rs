use std::cmp::Ordering;
use std::collections::HashSet;

use proptest::prelude::*;

use crate::record::{Auxiliary, Record};
use crate::schema::TableSchema;
use crate::sort::{SortDirection, compare};
use crate::view::{ViewState, project};

const SORT_KEYS: [&str; 5] = ["last_name", "status", "created_at", "section", "middle_name"];

fn arb_records() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["Cruz", "Reyes", "Santos", "abad", "Abad"]),
            prop::sample::select(vec!["Ana", "Ben", "Carla"]),
            prop::option::of(prop::sample::select(vec!["A", "B", "C", "Z"])),
            prop::option::of(1u32..9),
        ),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(idx, (last, first, section, day))| {
                let mut r = Record::new(idx.to_string())
                    .with("student_no", format!("2024-{idx:04}"))
                    .with("last_name", last)
                    .with("first_name", first);
                if let Some(section) = section {
                    r.set("section_id", section);
                }
                if let Some(day) = day {
                    r.set("created_at", format!("2024-03-0{day}"));
                }
                r
            })
            .collect()
    })
}

fn arb_aux() -> impl Strategy<Value = Auxiliary> {
    prop::collection::hash_set(0usize..40, 0..20).prop_map(|live| {
        Auxiliary::new(Default::default(), live.iter().map(ToString::to_string).collect())
            .with_label("A", "Section A")
            .with_label("B", "Section B")
            .with_label("C", "Rizal")
    })
}

fn arb_state() -> impl Strategy<Value = ViewState> {
    (
        prop::sample::select(vec!["", "a", "cruz", "ben", "section", "2024-00", "zzz"]),
        prop::sample::select(SORT_KEYS.to_vec()),
        any::<bool>(),
        prop::collection::vec(
            (
                prop::sample::select(vec!["section_id", "status"]),
                prop::sample::select(vec!["A", "B", "C", "online", "offline"]),
            ),
            0..3,
        ),
        1usize..8,
        0usize..12,
    )
        .prop_map(|(search, key, desc, filters, page_size, page)| {
            let mut state = ViewState::new(&TableSchema::students(), page_size)
                .with_search_text(search)
                .with_sort_key(key)
                .with_current_page(page);
            if desc {
                state.sort_direction = SortDirection::Descending;
            }
            for (dimension, value) in filters {
                state.filters.toggle(dimension, value);
            }
            state
        })
}

fn full(state: &ViewState) -> ViewState {
    state.clone().with_page_size(usize::MAX).with_current_page(1)
}

fn count(records: &[Record], aux: &Auxiliary, state: &ViewState) -> usize {
    project(records, aux, &TableSchema::students(), state).filtered_count
}

proptest! {
    #[test]
    fn projection_is_idempotent(records in arb_records(), aux in arb_aux(), state in arb_state()) {
        let schema = TableSchema::students();
        let first = project(&records, &aux, &schema, &state);
        let second = project(&records, &aux, &schema, &state);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn activating_a_dimension_never_grows_the_result(
        records in arb_records(),
        aux in arb_aux(),
        state in arb_state(),
        dimension in prop::sample::select(vec!["section_id", "status"]),
        value in prop::sample::select(vec!["A", "B", "online", "offline"]),
    ) {
        // Start from the drawn filters with `dimension` inactive.
        let mut base = state.clone();
        let selected: Vec<String> = base
            .filters
            .values(dimension)
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default();
        for selected_value in &selected {
            base.filters.toggle(dimension, selected_value);
        }
        prop_assert!(base.filters.values(dimension).is_none());

        let mut narrowed = base.clone();
        prop_assert!(narrowed.filters.toggle(dimension, value));
        prop_assert!(count(&records, &aux, &narrowed) <= count(&records, &aux, &base));

        // Removing every dimension never shrinks it.
        let mut widened = base.clone();
        widened.filters.clear();
        prop_assert!(count(&records, &aux, &widened) >= count(&records, &aux, &base));
    }

    #[test]
    fn another_value_in_an_active_dimension_never_shrinks(
        records in arb_records(),
        aux in arb_aux(),
        state in arb_state(),
        value in prop::sample::select(vec!["A", "B", "C", "Z"]),
    ) {
        let mut base = state.clone();
        base.filters.clear();
        base.filters.toggle("section_id", "A");
        let mut wider = base.clone();
        wider.filters.toggle("section_id", value);
        if value != "A" {
            prop_assert!(count(&records, &aux, &wider) >= count(&records, &aux, &base));
        }
    }

    #[test]
    fn empty_search_excludes_nothing(records in arb_records(), aux in arb_aux(), state in arb_state()) {
        let mut unfiltered = state.with_search_text("");
        unfiltered.filters.clear();
        prop_assert_eq!(count(&records, &aux, &unfiltered), records.len());
        let padded = unfiltered.with_search_text("   ");
        prop_assert_eq!(count(&records, &aux, &padded), records.len());
    }

    #[test]
    fn ties_keep_source_order(records in arb_records(), aux in arb_aux(), state in arb_state()) {
        let schema = TableSchema::students();
        let state = full(&state);
        let source = schema.sort_source(&state.sort_key);
        let rows = project(&records, &aux, &schema, &state).rows;
        for pair in rows.windows(2) {
            let (a, b) = (&records[pair[0]], &records[pair[1]]);
            if compare(&source, a, b, &aux) == Ordering::Equal {
                prop_assert!(pair[0] < pair[1]);
            }
        }
        let again = project(&records, &aux, &schema, &state).rows;
        prop_assert_eq!(rows, again);
    }

    #[test]
    fn pages_stay_in_bounds(records in arb_records(), aux in arb_aux(), state in arb_state()) {
        let schema = TableSchema::students();
        let p = project(&records, &aux, &schema, &state);
        prop_assert!(p.page_count >= 1);
        prop_assert!(p.current_page >= 1 && p.current_page <= p.page_count);
        prop_assert!(p.rows.len() <= state.page_size);
        let expected = p
            .filtered_count
            .saturating_sub((p.current_page - 1) * state.page_size)
            .min(state.page_size);
        prop_assert_eq!(p.rows.len(), expected);
        let seen: HashSet<_> = p.rows.iter().collect();
        prop_assert_eq!(seen.len(), p.rows.len());
    }

    #[test]
    fn toggled_direction_reverses_groups_not_ties(
        records in arb_records(),
        aux in arb_aux(),
        state in arb_state(),
    ) {
        let schema = TableSchema::students();
        let asc = full(&state).with_sort_direction(SortDirection::Ascending);
        let desc = asc.clone().with_sort_direction(SortDirection::Descending);
        let source = schema.sort_source(&asc.sort_key);

        let up = project(&records, &aux, &schema, &asc).rows;
        let down = project(&records, &aux, &schema, &desc).rows;

        let mut groups: Vec<Vec<usize>> = Vec::new();
        for idx in up {
            let tied = groups.last().is_some_and(|group| {
                compare(&source, &records[group[0]], &records[idx], &aux) == Ordering::Equal
            });
            if tied {
                groups.last_mut().unwrap().push(idx);
            } else {
                groups.push(vec![idx]);
            }
        }
        let expected: Vec<usize> = groups.into_iter().rev().flatten().collect();
        prop_assert_eq!(down, expected);
    }
}
