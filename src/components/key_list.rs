use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::app::{ListRow, PaneState};
use crate::components::fit;
use crate::keyspace::record::{format_bytes, format_ttl, KeyRecord};
use crate::theme::{type_color, ThemeColors};

const NOT_LOADED: &str = "…";
const TYPE_WIDTH: usize = 7;
const TTL_WIDTH: usize = 9;
const SIZE_WIDTH: usize = 9;
const META_WIDTH: usize = TYPE_WIDTH + TTL_WIDTH + SIZE_WIDTH + 3;

/// Flat key list with type, TTL and size columns.
pub struct KeyListWidget<'a> {
    rows: &'a [ListRow<'a>],
    pane: &'a PaneState,
    theme: &'a ThemeColors,
    focused: bool,
    block: Option<Block<'a>>,
}

impl<'a> KeyListWidget<'a> {
    pub fn new(rows: &'a [ListRow<'a>], pane: &'a PaneState, theme: &'a ThemeColors) -> Self {
        Self {
            rows,
            pane,
            theme,
            focused: true,
            block: None,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    fn key_line(&self, record: &KeyRecord, width: usize, selected: bool) -> Line<'static> {
        let name_width = width.saturating_sub(META_WIDTH);
        let name = fit(&record.name.to_str_lossy(), name_width);

        let type_label = record
            .key_type
            .loaded()
            .map_or(NOT_LOADED.to_string(), |t| t.label().to_string());
        let ttl = record
            .ttl
            .loaded()
            .map_or(NOT_LOADED.to_string(), |t| format_ttl(*t));
        let size = record
            .size
            .loaded()
            .map_or(NOT_LOADED.to_string(), |b| format_bytes(*b));

        let base = if selected {
            Style::default()
                .bg(self.theme.selected_bg)
                .fg(self.theme.selected_fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.theme.fg)
        };
        let type_style = match record.key_type.loaded() {
            Some(t) if !selected => Style::default().fg(type_color(t)),
            _ => base,
        };
        let dim = if selected {
            base
        } else {
            Style::default().fg(self.theme.dim_fg)
        };

        Line::from(vec![
            Span::styled(format!("{:<w$}", name, w = name_width), base),
            Span::styled(" ", base),
            Span::styled(
                format!("{:>w$}", fit(&type_label, TYPE_WIDTH), w = TYPE_WIDTH),
                type_style,
            ),
            Span::styled(" ", base),
            Span::styled(format!("{:>w$}", fit(&ttl, TTL_WIDTH), w = TTL_WIDTH), dim),
            Span::styled(" ", base),
            Span::styled(format!("{:>w$}", fit(&size, SIZE_WIDTH), w = SIZE_WIDTH), dim),
        ])
    }
}

impl<'a> Widget for KeyListWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };
        let height = inner.height as usize;
        let width = inner.width as usize;
        if height == 0 || width == 0 {
            return;
        }

        if self.rows.is_empty() {
            let line = Line::from(Span::styled(
                "No keys",
                Style::default().fg(self.theme.dim_fg),
            ));
            buf.set_line(inner.x, inner.y, &line, inner.width);
            return;
        }

        let visible = self
            .rows
            .iter()
            .enumerate()
            .skip(self.pane.scroll)
            .take(height);
        for (i, (idx, row)) in visible.enumerate() {
            let y = inner.y + i as u16;
            let selected = self.focused && idx == self.pane.selected;
            let line = match row {
                ListRow::Key(record) => self.key_line(record, width, selected),
                ListRow::LoadMore => {
                    let style = if selected {
                        Style::default()
                            .bg(self.theme.selected_bg)
                            .fg(self.theme.info_fg)
                            .add_modifier(Modifier::ITALIC)
                    } else {
                        Style::default()
                            .fg(self.theme.info_fg)
                            .add_modifier(Modifier::ITALIC)
                    };
                    Line::from(Span::styled(
                        format!("{:<w$}", "[+] Load more keys…", w = width),
                        style,
                    ))
                }
            };
            buf.set_line(inner.x, y, &line, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::buffer_to_string;
    use crate::keyspace::record::{KeyMetadata, KeyName, KeyType};
    use crate::theme::dark_theme;

    fn hydrated(name: &str) -> KeyRecord {
        let mut record = KeyRecord::new(KeyName::from(name));
        record.apply_metadata(&KeyMetadata {
            name: KeyName::from(name),
            key_type: KeyType::Hash,
            size: Some(2048),
            length: Some(3),
            ttl: Some(200),
        });
        record
    }

    #[test]
    fn renders_metadata_and_placeholders() {
        let loaded = hydrated("user:1");
        let bare = KeyRecord::new(KeyName::from("user:2"));
        let rows = vec![ListRow::Key(&loaded), ListRow::Key(&bare), ListRow::LoadMore];
        let pane = PaneState::default();
        let theme = dark_theme();

        let area = Rect::new(0, 0, 60, 4);
        let mut buf = Buffer::empty(area);
        KeyListWidget::new(&rows, &pane, &theme).render(area, &mut buf);

        let content = buffer_to_string(&buf, area);
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("user:1"));
        assert!(lines[0].contains("hash"));
        assert!(lines[0].contains("3m 20s"));
        assert!(lines[0].contains("2.0 KB"));
        assert!(lines[1].starts_with("user:2"));
        assert!(lines[1].contains('…'));
        assert!(lines[2].contains("Load more"));
    }

    #[test]
    fn selected_row_is_highlighted() {
        let a = hydrated("a");
        let b = hydrated("b");
        let rows = vec![ListRow::Key(&a), ListRow::Key(&b)];
        let pane = PaneState {
            selected: 1,
            scroll: 0,
        };
        let theme = dark_theme();

        let area = Rect::new(0, 0, 40, 2);
        let mut buf = Buffer::empty(area);
        KeyListWidget::new(&rows, &pane, &theme).render(area, &mut buf);

        assert_eq!(buf.cell((0, 1)).unwrap().bg, theme.selected_bg);
        assert_ne!(buf.cell((0, 0)).unwrap().bg, theme.selected_bg);
    }

    #[test]
    fn scroll_offset_skips_rows() {
        let records: Vec<KeyRecord> = (0..10).map(|i| hydrated(&format!("k{}", i))).collect();
        let rows: Vec<ListRow<'_>> = records.iter().map(ListRow::Key).collect();
        let pane = PaneState {
            selected: 7,
            scroll: 5,
        };
        let theme = dark_theme();

        let area = Rect::new(0, 0, 40, 3);
        let mut buf = Buffer::empty(area);
        KeyListWidget::new(&rows, &pane, &theme).render(area, &mut buf);

        let content = buffer_to_string(&buf, area);
        assert!(content.lines().next().unwrap().starts_with("k5"));
    }

    #[test]
    fn empty_list_says_so() {
        let rows: Vec<ListRow<'_>> = Vec::new();
        let pane = PaneState::default();
        let theme = dark_theme();
        let area = Rect::new(0, 0, 20, 2);
        let mut buf = Buffer::empty(area);
        KeyListWidget::new(&rows, &pane, &theme).render(area, &mut buf);
        assert!(buffer_to_string(&buf, area).contains("No keys"));
    }
}
