use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

use crate::components::dialog::centered_rect;
use crate::theme::ThemeColors;

struct KeyEntry {
    key: &'static str,
    description: &'static str,
}

struct KeyCategory {
    name: &'static str,
    entries: &'static [KeyEntry],
}

const CATEGORIES: &[KeyCategory] = &[
    KeyCategory {
        name: "Navigation",
        entries: &[
            KeyEntry { key: "j / ↓", description: "Move down" },
            KeyEntry { key: "k / ↑", description: "Move up" },
            KeyEntry { key: "PgDn / PgUp", description: "Page down / up" },
            KeyEntry { key: "g / G", description: "First / last row" },
            KeyEntry { key: "Tab", description: "Switch list / tree view" },
        ],
    },
    KeyCategory {
        name: "Keys",
        entries: &[
            KeyEntry { key: "Enter", description: "Toggle namespace, select key, load more" },
            KeyEntry { key: "l / h", description: "Open / close namespace" },
            KeyEntry { key: "m", description: "Load the next batch" },
            KeyEntry { key: "r", description: "Rescan from the start" },
        ],
    },
    KeyCategory {
        name: "Search",
        entries: &[
            KeyEntry { key: "/", description: "Filter by glob pattern" },
            KeyEntry { key: "Esc", description: "Clear the filter" },
            KeyEntry { key: "d", description: "Change tree delimiter" },
        ],
    },
    KeyCategory {
        name: "General",
        entries: &[
            KeyEntry { key: "?", description: "Toggle this help" },
            KeyEntry { key: "q / Ctrl+c", description: "Quit" },
        ],
    },
];

const KEY_COLUMN: usize = 14;

/// Key binding overlay.
pub struct HelpWidget<'a> {
    theme: &'a ThemeColors,
}

impl<'a> HelpWidget<'a> {
    pub fn new(theme: &'a ThemeColors) -> Self {
        Self { theme }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let header = Style::default()
            .fg(self.theme.accent_fg)
            .add_modifier(Modifier::BOLD);
        let key = Style::default().fg(self.theme.namespace_fg);
        let desc = Style::default().fg(self.theme.fg);

        let mut lines = Vec::new();
        for (i, category) in CATEGORIES.iter().enumerate() {
            if i > 0 {
                lines.push(Line::default());
            }
            lines.push(Line::from(Span::styled(category.name, header)));
            for entry in category.entries {
                lines.push(Line::from(vec![
                    Span::styled(format!("  {:<w$}", entry.key, w = KEY_COLUMN), key),
                    Span::styled(entry.description, desc),
                ]));
            }
        }
        lines
    }
}

impl<'a> Widget for HelpWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines = self.lines();
        let height = (lines.len() as u16).saturating_add(2);
        let rect = centered_rect(60, height, area);
        Clear.render(rect, buf);

        let block = Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border_focused_fg));
        let inner = block.inner(rect);
        block.render(rect, buf);

        for (i, line) in lines.iter().take(inner.height as usize).enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}
