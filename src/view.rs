use std::sync::Arc;
use std::time::Instant;

use derive_setters::Setters;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::filter::FilterSelection;
use crate::paginate::{PageWindow, clamp_page};
use crate::record::{Auxiliary, Record};
use crate::schema::TableSchema;
use crate::search::SearchQuery;
use crate::sort::{SortDirection, sort_rows};

/// Screen-local search, filter, sort and page selections.
#[derive(Debug, Clone, PartialEq, Eq, Setters)]
#[setters(prefix = "with_")]
pub struct ViewState {
    #[setters(into)]
    pub search_text: String,
    pub filters: FilterSelection,
    #[setters(into)]
    pub sort_key: String,
    pub sort_direction: SortDirection,
    pub current_page: usize,
    pub page_size: usize,
}

impl ViewState {
    pub fn new(schema: &TableSchema, page_size: usize) -> Self {
        let (sort_key, sort_direction) = schema.default_sort.clone();
        Self {
            search_text: String::new(),
            filters: FilterSelection::default(),
            sort_key,
            sort_direction,
            current_page: 1,
            page_size: page_size.max(1),
        }
    }
}

/// One displayable page. `rows` are indices into the projected record slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub rows: Vec<usize>,
    pub filtered_count: usize,
    pub page_count: usize,
    pub current_page: usize,
}

impl Projection {
    pub fn records<'a>(&'a self, records: &'a [Record]) -> impl Iterator<Item = &'a Record> + 'a {
        self.rows.iter().map(move |&idx| &records[idx])
    }

    pub fn ids(&self, records: &[Record]) -> Vec<String> {
        self.records(records).map(|r| r.id.clone()).collect()
    }
}

/// Search, then filter, then sort, then paginate. Pure: equal inputs give
/// equal outputs.
pub fn project(
    records: &[Record],
    aux: &Auxiliary,
    schema: &TableSchema,
    state: &ViewState,
) -> Projection {
    let start_time = Instant::now();
    let query = SearchQuery::new(&state.search_text);

    // Indexed parallel collect keeps source order.
    let matching: Vec<usize> = (0..records.len())
        .into_par_iter()
        .filter(|&idx| {
            let record = &records[idx];
            query.matches(record, schema, aux) && state.filters.passes(record, schema, aux)
        })
        .collect();

    let source = schema.sort_source(&state.sort_key);
    let ordered = sort_rows(matching, records, aux, &source, state.sort_direction);
    let window = PageWindow::new(ordered.len(), state.page_size, state.current_page);

    trace!(
        "Projected {}: {}/{} rows match \"{}\", sort {} {}, page {}/{} in {}µs",
        schema.name,
        ordered.len(),
        records.len(),
        query.term(),
        state.sort_key,
        state.sort_direction,
        window.page,
        window.page_count,
        start_time.elapsed().as_micros()
    );

    Projection {
        rows: ordered[window.start..window.end].to_vec(),
        filtered_count: ordered.len(),
        page_count: window.page_count,
        current_page: window.page,
    }
}

/// Discrete user actions on the view state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    SetSearchText(String),
    ToggleFilterValue { dimension: String, value: String },
    ClearFilters,
    SetSort(String),
    GoToPage(usize),
    NextPage,
    PreviousPage,
    LastPage,
}

struct CachedProjection {
    records: Arc<Vec<Record>>,
    aux: Arc<Auxiliary>,
    state: ViewState,
    projection: Projection,
}

pub struct TableViewModel {
    schema: Arc<TableSchema>,
    state: ViewState,
    page_count: Option<usize>,
    cache: Option<CachedProjection>,
}

impl TableViewModel {
    pub fn new(schema: Arc<TableSchema>, page_size: usize) -> Self {
        let state = ViewState::new(&schema, page_size);
        Self::with_state(schema, state)
    }

    pub fn with_state(schema: Arc<TableSchema>, state: ViewState) -> Self {
        Self {
            schema,
            state,
            page_count: None,
            cache: None,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn set_search_text(&mut self, text: &str) {
        self.state.search_text = text.to_string();
    }

    /// Returns true if the value is selected after the toggle.
    pub fn toggle_filter_value(&mut self, dimension: &str, value: &str) -> bool {
        let selected = self.state.filters.toggle(dimension, value);
        debug!("Filter {dimension}={value} selected: {selected}");
        selected
    }

    pub fn clear_filters(&mut self) {
        self.state.filters.clear();
    }

    /// Reselecting the current key flips the direction; a new key starts
    /// ascending.
    pub fn set_sort(&mut self, key: &str) {
        if self.state.sort_key == key {
            self.state.sort_direction = self.state.sort_direction.toggled();
        } else {
            self.state.sort_key = key.to_string();
            self.state.sort_direction = SortDirection::Ascending;
        }
        debug!("Sort by {} {}", self.state.sort_key, self.state.sort_direction);
    }

    /// Clamped against the last projection's page count.
    pub fn go_to_page(&mut self, page: usize) {
        self.state.current_page = match self.page_count {
            Some(count) => clamp_page(page, count),
            None => page.max(1),
        };
    }

    pub fn next_page(&mut self) {
        self.go_to_page(self.state.current_page.saturating_add(1));
    }

    pub fn previous_page(&mut self) {
        self.go_to_page(self.state.current_page.saturating_sub(1));
    }

    pub fn last_page(&mut self) {
        self.go_to_page(self.page_count.unwrap_or(usize::MAX));
    }

    pub fn apply(&mut self, action: ViewAction) {
        trace!("View action {action:?}");
        match action {
            ViewAction::SetSearchText(text) => self.set_search_text(&text),
            ViewAction::ToggleFilterValue { dimension, value } => {
                self.toggle_filter_value(&dimension, &value);
            }
            ViewAction::ClearFilters => self.clear_filters(),
            ViewAction::SetSort(key) => self.set_sort(&key),
            ViewAction::GoToPage(page) => self.go_to_page(page),
            ViewAction::NextPage => self.next_page(),
            ViewAction::PreviousPage => self.previous_page(),
            ViewAction::LastPage => self.last_page(),
        }
    }

    /// Projects and writes the clamped page back into the view state.
    pub fn project(&mut self, records: &[Record], aux: &Auxiliary) -> Projection {
        let projection = project(records, aux, &self.schema, &self.state);
        self.state.current_page = projection.current_page;
        self.page_count = Some(projection.page_count);
        projection
    }

    /// Like `project`, but reuses the previous result when called again with
    /// the same record and auxiliary allocations and an unchanged view state.
    pub fn project_cached(
        &mut self,
        records: &Arc<Vec<Record>>,
        aux: &Arc<Auxiliary>,
    ) -> Projection {
        if let Some(cached) = &self.cache
            && Arc::ptr_eq(&cached.records, records)
            && Arc::ptr_eq(&cached.aux, aux)
            && cached.state == self.state
        {
            trace!("Projection cache hit");
            return cached.projection.clone();
        }
        let projection = self.project(records, aux);
        self.cache = Some(CachedProjection {
            records: Arc::clone(records),
            aux: Arc::clone(aux),
            state: self.state.clone(),
            projection: projection.clone(),
        });
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        ColumnSpec, DerivedField, FieldKind, FilterDimension, GroupLabel, ValueSource,
    };

    fn records() -> Vec<Record> {
        vec![
            Record::new("1")
                .with("last_name", "Cruz")
                .with("first_name", "Ana")
                .with("section_id", "A")
                .with("created_at", "2024-01-01"),
            Record::new("2")
                .with("last_name", "Reyes")
                .with("first_name", "Ben")
                .with("section_id", "B")
                .with("created_at", "2024-02-01"),
        ]
    }

    fn aux() -> Auxiliary {
        Auxiliary::default()
            .with_label("A", "Section A")
            .with_label("B", "Section B")
            .with_live("2")
    }

    fn schema() -> Arc<TableSchema> {
        let mut schema = TableSchema::students();
        schema.filters.push(FilterDimension::new(
            "group",
            "section",
            ValueSource::field("section_id", FieldKind::Text),
        ));
        schema.columns.push(ColumnSpec::new(
            "createdAt",
            "Created",
            ValueSource::field("created_at", FieldKind::Date),
        ));
        Arc::new(schema)
    }

    fn ids(vm: &mut TableViewModel) -> Vec<String> {
        let recs = records();
        vm.project(&recs, &aux()).ids(&recs)
    }

    #[test]
    fn search_selects_by_last_name() {
        let mut vm = TableViewModel::new(schema(), 10);
        vm.set_search_text("cruz");
        assert_eq!(ids(&mut vm), vec!["1"]);
    }

    #[test]
    fn group_filter_selects_member() {
        let mut vm = TableViewModel::new(schema(), 10);
        vm.toggle_filter_value("group", "B");
        assert_eq!(ids(&mut vm), vec!["2"]);
    }

    #[test]
    fn created_at_descending() {
        let mut vm = TableViewModel::new(schema(), 10);
        vm.set_sort("createdAt");
        vm.set_sort("createdAt");
        assert_eq!(vm.state().sort_direction, SortDirection::Descending);
        assert_eq!(ids(&mut vm), vec!["2", "1"]);
    }

    #[test]
    fn second_page_of_default_sort() {
        let state = ViewState::new(&schema(), 1).with_current_page(2);
        let mut vm = TableViewModel::with_state(schema(), state);
        let recs = records();
        let p = vm.project(&recs, &aux());
        assert_eq!(p.ids(&recs), vec!["2"]);
        assert_eq!(p.page_count, 2);
        assert_eq!(p.filtered_count, 2);
    }

    #[test]
    fn new_sort_key_starts_ascending() {
        let mut vm = TableViewModel::new(schema(), 10);
        vm.set_sort("last_name");
        vm.set_sort("last_name");
        vm.set_sort("first_name");
        assert_eq!(vm.state().sort_key, "first_name");
        assert_eq!(vm.state().sort_direction, SortDirection::Ascending);
    }

    #[test]
    fn page_is_clamped_when_result_shrinks() {
        let mut vm = TableViewModel::new(schema(), 1);
        let recs = records();
        vm.project(&recs, &aux());
        vm.last_page();
        assert_eq!(vm.state().current_page, 2);
        vm.next_page();
        assert_eq!(vm.state().current_page, 2);

        vm.set_search_text("reyes");
        let p = vm.project(&recs, &aux());
        assert_eq!(p.current_page, 1);
        assert_eq!(vm.state().current_page, 1);
        vm.previous_page();
        assert_eq!(vm.state().current_page, 1);
    }

    #[test]
    fn empty_result_is_page_one_of_one() {
        let mut vm = TableViewModel::new(schema(), 5);
        vm.set_search_text("nobody");
        let p = vm.project(&records(), &aux());
        assert!(p.rows.is_empty());
        assert_eq!((p.current_page, p.page_count, p.filtered_count), (1, 1, 0));
    }

    #[test]
    fn clear_filters_restores_all_rows() {
        let mut vm = TableViewModel::new(schema(), 10);
        vm.apply(ViewAction::ToggleFilterValue {
            dimension: "status".into(),
            value: "online".into(),
        });
        assert_eq!(ids(&mut vm), vec!["2"]);
        vm.apply(ViewAction::ClearFilters);
        assert_eq!(ids(&mut vm).len(), 2);
    }

    #[test]
    fn derived_labels_follow_the_lookup() {
        let recs = records();
        let mut vm = TableViewModel::new(schema(), 10);
        vm.set_search_text("section a");
        assert_eq!(vm.project(&recs, &aux()).ids(&recs), vec!["1"]);

        let renamed = aux().with_label("A", "Mabini");
        assert!(vm.project(&recs, &renamed).rows.is_empty());
    }

    #[test]
    fn cached_projection_reused_until_inputs_change() {
        let recs = Arc::new(records());
        let aux = Arc::new(aux());
        let mut vm = TableViewModel::new(schema(), 10);
        let first = vm.project_cached(&recs, &aux);
        assert_eq!(vm.project_cached(&recs, &aux), first);

        // A fresh presence snapshot is a new allocation.
        let nobody_online = Arc::new(Auxiliary {
            live: Default::default(),
            ..(*aux).clone()
        });
        let second = vm.project_cached(&recs, &nobody_online);
        assert_eq!(second.filtered_count, 2);
        vm.toggle_filter_value("status", "online");
        assert_eq!(vm.project_cached(&recs, &nobody_online).filtered_count, 0);
        assert_eq!(vm.project_cached(&recs, &aux).filtered_count, 1);
    }

    #[test]
    fn unresolved_group_still_projects() {
        let mut recs = records();
        recs.push(Record::new("3").with("section_id", "Q"));
        let schema = schema();
        let mut vm = TableViewModel::new(Arc::clone(&schema), 10);
        vm.set_sort("section");
        let p = vm.project(&recs, &aux());
        assert_eq!(p.ids(&recs), vec!["1", "2", "3"]);
        let label = GroupLabel {
            field: "section_id".into(),
        };
        assert_eq!(label.resolve(&recs[2], &aux()), "Unknown");
    }
}
