use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::CMDMode;
use crate::model::{Model, UIData};

pub const COLUMN_SPACING: u16 = 1;
const POPUP_WIDTH_PERCENT: u16 = 60;
const POPUP_HEIGHT_PERCENT: u16 = 70;

#[derive(Default)]
pub struct TableUI {
    state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, filter_area, status_area] = Layout::vertical([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_table(&uidata, frame, table_area);
        Self::draw_filters(&uidata, frame, filter_area);
        Self::draw_statusline(&uidata, frame, status_area);

        if uidata.show_popup {
            Self::draw_popup(&uidata, frame);
        }
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(uidata.table.iter().enumerate().map(|(idx, column)| {
            let title = match uidata.sort_column {
                Some(sorted) if sorted == idx => {
                    format!("{} {}", column.name, uidata.sort_direction)
                }
                _ => column.name.clone(),
            };
            Cell::from(title)
        }))
        .style(Style::new().bold().underlined());

        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nrows).map(|ridx| {
            Row::new(
                uidata
                    .table
                    .iter()
                    .map(|column| Cell::from(column.data[ridx].as_str())),
            )
        });
        let widths = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width as u16));

        let title = Line::from(format!(" {} ", uidata.name).bold());
        let footer = Line::from(format!(
            " page {}/{} · {} of {} rows ",
            uidata.page, uidata.page_count, uidata.filtered_count, uidata.total_count
        ));
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(footer.right_aligned())
            .border_set(border::ROUNDED);

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .block(block)
            .row_highlight_style(Style::new().bg(Color::DarkGray))
            .cell_highlight_style(Style::new().reversed());

        if nrows == 0 {
            self.state.select(None);
        } else {
            self.state.select(Some(uidata.selected_row));
        }
        self.state.select_column(Some(uidata.selected_column));
        frame.render_stateful_widget(table, area, &mut self.state);
    }

    fn draw_filters(uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();
        if !uidata.search_text.is_empty() {
            spans.push(Span::from(format!(" search: \"{}\" ", uidata.search_text)).yellow());
        }
        for chip in &uidata.filters {
            spans.push(Span::from(format!(" [{chip}] ")).cyan());
        }
        if spans.is_empty() {
            spans.push(Span::from(" no filters ").dark_gray());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_statusline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = match uidata.cmd_mode {
                Some(CMDMode::Search) | None => "/",
            };
            let line = Line::from(vec![
                Span::from(prompt).bold(),
                Span::from(uidata.cmdinput.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let offset = prompt_offset(prompt, &uidata.cmdinput.input, uidata.cmdinput.cursor_pos);
            let x = area.x.saturating_add(offset);
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        } else {
            let line = Line::from(vec![
                Span::from(uidata.status_message.as_str()),
                Span::from("  ? help").dark_gray(),
            ]);
            frame.render_widget(Paragraph::new(line), area);
        }
    }

    fn draw_popup(uidata: &UIData, frame: &mut Frame) {
        let area = popup_area(frame.area(), POPUP_WIDTH_PERCENT, POPUP_HEIGHT_PERCENT);
        let block = Block::bordered()
            .title(Line::from(" Help ").centered())
            .border_set(border::THICK);
        let popup = Paragraph::new(uidata.popup_message.as_str())
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(Clear, area);
        frame.render_widget(popup, area);
    }
}

/// Display columns between the start of the prompt and the cursor, which
/// sits `cursor_pos` chars into `input`.
fn prompt_offset(prompt: &str, input: &str, cursor_pos: usize) -> u16 {
    let before: String = input.chars().take(cursor_pos).collect();
    let width = Span::from(prompt).width() + Span::from(before).width();
    u16::try_from(width).unwrap_or(u16::MAX)
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_cursor_counts_display_columns() {
        assert_eq!(prompt_offset("/", "", 0), 1);
        assert_eq!(prompt_offset("/", "cruz", 2), 3);
        // Wide characters take two columns each.
        assert_eq!(prompt_offset("/", "李娜 ana", 2), 5);
        assert_eq!(prompt_offset("/", "Peña", 4), 5);
    }
}
