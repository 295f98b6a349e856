use arboard::Clipboard;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{CMDMode, HELP_TEXT, Message, RVConfig, RVError};
use crate::inputter::{InputResult, Inputter};
use crate::loader;
use crate::record::{Auxiliary, Record};
use crate::schema::TableSchema;
use crate::sort::SortDirection;
use crate::view::{Projection, TableViewModel, ViewAction};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

#[derive(Clone, Debug)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

/// Everything the UI needs to draw one frame.
pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub sort_column: Option<usize>,
    pub sort_direction: SortDirection,
    pub page: usize,
    pub page_count: usize,
    pub filtered_count: usize,
    pub total_count: usize,
    pub filters: Vec<String>,
    pub search_text: String,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
}

struct PresenceSource {
    path: PathBuf,
    modified: Option<SystemTime>,
    failing: bool,
}

pub struct Model {
    config: RVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    records: Arc<Vec<Record>>,
    aux: Arc<Auxiliary>,
    view: TableViewModel,
    projection: Projection,
    presence: Option<PresenceSource>,
    curser_row: usize,
    curser_column: usize,
    clipboard: Option<Clipboard>,
    input: Inputter,
    last_input: InputResult,
    cmd_mode: Option<CMDMode>,
    search_before_input: String,
    popup_message: String,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &RVConfig,
        schema: TableSchema,
        records: Vec<Record>,
        aux: Auxiliary,
    ) -> Self {
        let clipboard = match Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Clipboard unavailable: {e}");
                None
            }
        };
        let presence = config.presence_path.as_ref().map(|path| PresenceSource {
            path: path.clone(),
            modified: loader::get_file_info(path).ok().and_then(|i| i.modified),
            failing: false,
        });
        let total = records.len();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            records: Arc::new(records),
            aux: Arc::new(aux),
            view: TableViewModel::new(Arc::new(schema), config.page_size),
            projection: Projection {
                rows: Vec::new(),
                filtered_count: 0,
                page_count: 1,
                current_page: 1,
            },
            presence,
            curser_row: 0,
            curser_column: 0,
            clipboard,
            input: Inputter::default(),
            last_input: InputResult::default(),
            cmd_mode: None,
            search_before_input: String::new(),
            popup_message: String::new(),
            status_message: format!("Loaded {total} records"),
        };
        model.refresh();
        model
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn view(&self) -> &TableViewModel {
        &self.view
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn refresh(&mut self) {
        self.projection = self.view.project_cached(&self.records, &self.aux);
        self.curser_row = self
            .curser_row
            .min(self.projection.rows.len().saturating_sub(1));
        self.curser_column = self
            .curser_column
            .min(self.view.schema().columns.len().saturating_sub(1));
    }

    fn selected_record(&self) -> Option<&Record> {
        self.projection
            .rows
            .get(self.curser_row)
            .map(|&idx| &self.records[idx])
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), RVError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::MoveLeft => self.curser_column = self.curser_column.saturating_sub(1),
                    Message::MoveRight => self.curser_column += 1,
                    Message::NextPage => self.view.apply(ViewAction::NextPage),
                    Message::PreviousPage => self.view.apply(ViewAction::PreviousPage),
                    Message::FirstPage => self.view.apply(ViewAction::GoToPage(1)),
                    Message::LastPage => self.view.apply(ViewAction::LastPage),
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::SortColumn => self.sort_current_column(),
                    Message::ToggleFilter => self.toggle_filter_on_selection(),
                    Message::ClearFilters => {
                        self.view.apply(ViewAction::ClearFilters);
                        self.set_status_message("Filters cleared");
                    }
                    Message::CopyRow => self.copy_row(),
                    Message::ReloadPresence => self.poll_presence(true),
                    Message::Tick => self.poll_presence(false),
                    Message::Help => self.show_help(),
                    Message::Exit => {
                        if !self.view.state().search_text.is_empty() {
                            self.view.apply(ViewAction::SetSearchText(String::new()));
                            self.set_status_message("Search cleared");
                        }
                    }
                    Message::Resize(width, height) => trace!("UI resized to {width}x{height}"),
                    Message::RawKey(_) => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.close_popup(),
                    Message::Tick => self.poll_presence(false),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => {
                        self.last_input = self.input.read(key);
                        self.handle_cmd_input();
                    }
                    Message::Tick => self.poll_presence(false),
                    _ => (),
                },
            }
        }
        self.refresh();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn move_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.projection.current_page > 1 {
            self.view.apply(ViewAction::PreviousPage);
            self.curser_row = usize::MAX;
        }
    }

    fn move_selection_down(&mut self) {
        if self.curser_row + 1 < self.projection.rows.len() {
            self.curser_row += 1;
        } else if self.projection.current_page < self.projection.page_count {
            self.view.apply(ViewAction::NextPage);
            self.curser_row = 0;
        }
    }

    fn sort_current_column(&mut self) {
        let Some(column) = self.view.schema().columns.get(self.curser_column) else {
            return;
        };
        let key = column.key.clone();
        self.view.apply(ViewAction::SetSort(key));
        let state = self.view.state();
        let message = format!("Sorted by {} {}", state.sort_key, state.sort_direction);
        self.set_status_message(message);
    }

    fn toggle_filter_on_selection(&mut self) {
        let schema = self.view.schema();
        let Some(column) = schema.columns.get(self.curser_column) else {
            return;
        };
        let Some(dimension) = schema.dimension_for_column(&column.key) else {
            let message = format!("{} cannot be filtered", column.title);
            self.set_status_message(message);
            return;
        };
        let Some(record) = self.selected_record() else {
            return;
        };
        let value = dimension.source.text(record, &self.aux);
        let key = dimension.key.clone();
        let selected = self.view.toggle_filter_value(&key, &value);
        self.view.go_to_page(1);
        self.curser_row = 0;
        let verb = if selected { "added" } else { "removed" };
        self.set_status_message(format!("Filter {key}={value} {verb}"));
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.search_before_input = self.view.state().search_text.clone();
        self.input.set(&self.search_before_input);
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        match self.cmd_mode {
            Some(CMDMode::Search) => {
                // Search is applied on every keystroke; Esc restores the
                // text from before the prompt was opened.
                let text = if self.last_input.canceled {
                    self.search_before_input.clone()
                } else {
                    self.last_input.input.clone()
                };
                if text != self.view.state().search_text {
                    self.view.apply(ViewAction::SetSearchText(text));
                    self.view.go_to_page(1);
                    self.curser_row = 0;
                }
            }
            None => info!("Cmd mode is none!"),
        }

        if self.last_input.finished {
            trace!("Leaving command mode with {:?}", self.last_input.input);
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CMDINPUT;
            self.cmd_mode = None;
            self.refresh();
            let message = format!("{} matching rows", self.projection.filtered_count);
            self.set_status_message(message);
        }
    }

    /// Reports reload failures once until the file becomes readable again,
    /// or on every forced reload.
    fn poll_presence(&mut self, force: bool) {
        let result = self.reload_presence(force);
        let was_failing = self
            .presence
            .as_mut()
            .is_some_and(|source| std::mem::replace(&mut source.failing, result.is_err()));
        match result {
            Ok(true) => {
                let message = format!("{} online", self.aux.live.len());
                self.set_status_message(message);
            }
            Ok(false) => (),
            Err(e) if was_failing && !force => trace!("Presence still unavailable: {e}"),
            Err(e) => {
                error!("Reloading presence failed: {e}");
                self.set_status_message(format!("Presence reload failed: {e}"));
            }
        }
    }

    /// Re-reads the presence file when forced or when its modification time
    /// changed. Returns whether the live set was replaced.
    fn reload_presence(&mut self, force: bool) -> Result<bool, RVError> {
        let Some(source) = self.presence.as_mut() else {
            if force {
                self.status_message = "No presence file configured".into();
            }
            return Ok(false);
        };
        let info = loader::get_file_info(&source.path)?;
        if !force && !source.failing && info.modified == source.modified {
            return Ok(false);
        }
        let live = loader::load_presence(&source.path)?;
        source.modified = info.modified;
        debug!("Presence reloaded: {} online", live.len());
        self.aux = Arc::new(Auxiliary::new(self.aux.lookup.clone(), live));
        Ok(true)
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn selected_row_csv(&self) -> Option<String> {
        let record = self.selected_record()?;
        let cells: Vec<String> = self
            .view
            .schema()
            .columns
            .iter()
            .map(|c| Self::wrap_cell_content(&c.source.text(record, &self.aux)))
            .collect();
        Some(cells.join(","))
    }

    fn copy_row(&mut self) {
        let Some(row) = self.selected_row_csv() else {
            return;
        };
        trace!("Row content: {}", row);
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(row).map_err(|e| e.to_string()),
            None => Err("clipboard unavailable".to_string()),
        };
        match result {
            Ok(()) => self.set_status_message("Copied row to clipboard"),
            Err(e) => {
                warn!("Error copying to clipboard: {e}");
                self.set_status_message(format!("Copy failed: {e}"));
            }
        }
    }

    pub fn get_uidata(&self) -> UIData {
        let schema = self.view.schema();
        let state = self.view.state();
        let page: Vec<&Record> = self.projection.records(&self.records).collect();

        let table = schema
            .columns
            .iter()
            .map(|column| {
                let data: Vec<String> = page
                    .iter()
                    .map(|r| column.source.text(r, &self.aux))
                    .collect();
                let widest = data.iter().map(|s| s.chars().count()).max().unwrap_or(0);
                // Room for the sort marker next to the title.
                let width = widest
                    .max(column.title.chars().count() + 2)
                    .min(self.config.max_column_width);
                ColumnView {
                    name: column.title.clone(),
                    width,
                    data,
                }
            })
            .collect();

        let filters = state
            .filters
            .iter()
            .map(|(dimension, values)| {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                format!("{dimension} ∈ {{{}}}", values.join(", "))
            })
            .collect();

        UIData {
            name: schema.name.clone(),
            table,
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            sort_column: schema.columns.iter().position(|c| c.key == state.sort_key),
            sort_direction: state.sort_direction,
            page: self.projection.current_page,
            page_count: self.projection.page_count,
            filtered_count: self.projection.filtered_count,
            total_count: self.records.len(),
            filters,
            search_text: state.search_text.clone(),
            show_popup: self.modus == Modus::POPUP,
            popup_message: self.popup_message.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.modus == Modus::CMDINPUT,
            status_message: self.status_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn model(page_size: usize) -> Model {
        let records = vec![
            Record::new("1")
                .with("student_no", "2024-0001")
                .with("last_name", "Cruz")
                .with("first_name", "Ana")
                .with("section_id", "A"),
            Record::new("2")
                .with("student_no", "2024-0002")
                .with("last_name", "Reyes")
                .with("first_name", "Ben")
                .with("section_id", "B"),
            Record::new("3")
                .with("student_no", "2024-0003")
                .with("last_name", "Santos, Jr.")
                .with("first_name", "Carlo")
                .with("section_id", "A"),
        ];
        let aux = Auxiliary::default()
            .with_label("A", "Section A")
            .with_label("B", "Section B")
            .with_live("2");
        let config = RVConfig {
            page_size,
            ..RVConfig::default()
        };
        Model::init(&config, TableSchema::students(), records, aux)
    }

    fn ids(m: &Model) -> Vec<String> {
        m.projection().ids(&m.records)
    }

    fn send(m: &mut Model, msg: Message) {
        m.update(Some(msg)).unwrap();
    }

    fn type_keys(m: &mut Model, text: &str) {
        for c in text.chars() {
            send(m, Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        }
    }

    #[test]
    fn default_sort_puts_offline_first() {
        let m = model(10);
        assert_eq!(ids(&m), vec!["1", "3", "2"]);
        assert_eq!(m.get_uidata().sort_column, Some(0));
    }

    #[test]
    fn live_search_and_cancel() {
        let mut m = model(10);
        send(&mut m, Message::Search);
        assert!(m.raw_keyevents());
        type_keys(&mut m, "rey");
        assert_eq!(ids(&m), vec!["2"]);
        send(
            &mut m,
            Message::RawKey(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)),
        );
        assert!(!m.raw_keyevents());
        assert_eq!(ids(&m).len(), 3);
    }

    #[test]
    fn filter_from_selected_cell() {
        let mut m = model(10);
        // Status column, first row is offline.
        send(&mut m, Message::ToggleFilter);
        assert_eq!(ids(&m), vec!["1", "3"]);
        assert_eq!(m.get_uidata().filters, vec!["status ∈ {offline}"]);
        send(&mut m, Message::ClearFilters);
        assert_eq!(ids(&m).len(), 3);

        // Section column filters by foreign key.
        for _ in 0..5 {
            send(&mut m, Message::MoveRight);
        }
        send(&mut m, Message::ToggleFilter);
        assert_eq!(m.view().state().filters.values("section_id").unwrap().len(), 1);
        assert_eq!(ids(&m), vec!["1", "3"]);
    }

    #[test]
    fn sort_toggles_on_same_column() {
        let mut m = model(10);
        send(&mut m, Message::MoveRight);
        send(&mut m, Message::MoveRight);
        send(&mut m, Message::SortColumn);
        assert_eq!(ids(&m), vec!["1", "2", "3"]);
        send(&mut m, Message::SortColumn);
        assert_eq!(ids(&m), vec!["3", "2", "1"]);
    }

    #[test]
    fn paging_and_row_walk() {
        let mut m = model(2);
        assert_eq!(m.get_uidata().page_count, 2);
        send(&mut m, Message::MoveDown);
        send(&mut m, Message::MoveDown);
        assert_eq!(m.projection().current_page, 2);
        send(&mut m, Message::NextPage);
        assert_eq!(m.projection().current_page, 2);
        send(&mut m, Message::FirstPage);
        assert_eq!(m.projection().current_page, 1);
        send(&mut m, Message::LastPage);
        assert_eq!(m.projection().current_page, 2);
        send(&mut m, Message::MoveUp);
        assert_eq!(m.projection().current_page, 1);
        assert_eq!(m.get_uidata().selected_row, 1);
    }

    #[test]
    fn csv_row_quotes_commas() {
        let mut m = model(10);
        send(&mut m, Message::MoveDown);
        let row = m.selected_row_csv().unwrap();
        assert_eq!(
            row,
            "offline,2024-0003,\"Santos, Jr.\",Carlo,,\"Section A\",,"
        );
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut m = model(10);
        send(&mut m, Message::Help);
        assert!(m.get_uidata().show_popup);
        send(&mut m, Message::Exit);
        assert!(!m.get_uidata().show_popup);
    }

    #[test]
    fn unreadable_presence_file_is_reported_once() {
        let dir = std::env::temp_dir().join(format!("rosterview-presence-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("online.csv");
        let _ = std::fs::remove_file(&path);
        let config = RVConfig {
            presence_path: Some(path.clone()),
            ..RVConfig::default()
        };
        let mut m = Model::init(&config, TableSchema::students(), Vec::new(), Auxiliary::default());

        send(&mut m, Message::Tick);
        assert!(m.get_uidata().status_message.starts_with("Presence reload failed"));
        m.set_status_message("moved on");
        send(&mut m, Message::Tick);
        assert_eq!(m.get_uidata().status_message, "moved on");

        std::fs::write(&path, "id\n1\n3\n").unwrap();
        send(&mut m, Message::Tick);
        assert_eq!(m.get_uidata().status_message, "2 online");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn forced_reload_without_presence_file_is_harmless() {
        let mut m = model(10);
        send(&mut m, Message::ReloadPresence);
        assert_eq!(m.get_uidata().status_message, "No presence file configured");
    }
}
