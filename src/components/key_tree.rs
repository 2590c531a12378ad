use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::app::PaneState;
use crate::keyspace::record::KeyName;
use crate::tree::builder::{RowKind, TreeRow};
use crate::theme::ThemeColors;

/// Namespace tree drawn with box-drawing connectors.
pub struct KeyTreeWidget<'a> {
    rows: &'a [TreeRow],
    pane: &'a PaneState,
    theme: &'a ThemeColors,
    selected_leaf: Option<&'a KeyName>,
    focused: bool,
    block: Option<Block<'a>>,
}

impl<'a> KeyTreeWidget<'a> {
    pub fn new(rows: &'a [TreeRow], pane: &'a PaneState, theme: &'a ThemeColors) -> Self {
        Self {
            rows,
            pane,
            theme,
            selected_leaf: None,
            focused: true,
            block: None,
        }
    }

    pub fn selected_leaf(mut self, leaf: Option<&'a KeyName>) -> Self {
        self.selected_leaf = leaf;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Connector prefix for `rows[index]`. Each ancestor level contributes a
    /// continuation bar unless that ancestor was the last of its siblings.
    fn build_prefix(rows: &[TreeRow], index: usize) -> String {
        let row = &rows[index];
        if row.depth == 0 {
            return String::new();
        }
        let mut prefix = String::new();
        for d in 1..row.depth {
            let ancestor_is_last = rows[..index]
                .iter()
                .rev()
                .take_while(|r| r.depth >= d)
                .find(|r| r.depth == d)
                .is_some_and(|r| r.is_last_sibling);
            prefix.push_str(if ancestor_is_last { "   " } else { "│  " });
        }
        prefix.push_str(if row.is_last_sibling { "└──" } else { "├──" });
        prefix
    }

    fn indicator(row: &TreeRow) -> &'static str {
        match row.kind {
            RowKind::Branch { .. } if row.is_open => "▾ ",
            RowKind::Branch { .. } => "▸ ",
            RowKind::Leaf { .. } => "  ",
            RowKind::LoadMore => "[+] ",
        }
    }
}

impl<'a> Widget for KeyTreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };
        let height = inner.height as usize;
        if height == 0 || inner.width == 0 {
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
            let is_cursor = self.focused && idx == self.pane.selected;
            let is_chosen = matches!(
                (&row.kind, self.selected_leaf),
                (RowKind::Leaf { name }, Some(leaf)) if name == leaf
            );

            let style = if is_cursor {
                Style::default()
                    .bg(self.theme.selected_bg)
                    .fg(self.theme.selected_fg)
                    .add_modifier(Modifier::BOLD)
            } else if is_chosen {
                Style::default()
                    .fg(self.theme.accent_fg)
                    .add_modifier(Modifier::BOLD)
            } else {
                match row.kind {
                    RowKind::Branch { .. } => Style::default()
                        .fg(self.theme.namespace_fg)
                        .add_modifier(Modifier::BOLD),
                    RowKind::Leaf { .. } => Style::default().fg(self.theme.fg),
                    RowKind::LoadMore => Style::default()
                        .fg(self.theme.info_fg)
                        .add_modifier(Modifier::ITALIC),
                }
            };

            let prefix = Self::build_prefix(self.rows, idx);
            let mut spans = vec![Span::styled(
                format!("{}{}{}", prefix, Self::indicator(row), row.label),
                style,
            )];
            if let RowKind::Branch { key_count, .. } = row.kind {
                let count_style = if is_cursor {
                    style
                } else {
                    Style::default().fg(self.theme.count_fg)
                };
                spans.push(Span::styled(format!(" ({})", key_count), count_style));
            }
            buf.set_line(inner.x, y, &Line::from(spans), inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::buffer_to_string;
    use crate::theme::dark_theme;
    use crate::tree::builder::TreeBuilder;

    fn rows() -> Vec<TreeRow> {
        let keys: Vec<KeyName> = ["a:b:1", "a:b:2", "a:c:1", "z"]
            .iter()
            .map(|s| KeyName::from(*s))
            .collect();
        let mut tree = TreeBuilder::build(&keys, ":");
        tree.set_open("a", true);
        tree.set_open("a:b", true);
        tree.flatten()
    }

    #[test]
    fn draws_connectors_and_counts() {
        let rows = rows();
        let pane = PaneState::default();
        let theme = dark_theme();
        let area = Rect::new(0, 0, 30, 6);
        let mut buf = Buffer::empty(area);
        KeyTreeWidget::new(&rows, &pane, &theme)
            .focused(false)
            .render(area, &mut buf);

        let content = buffer_to_string(&buf, area);
        let lines: Vec<&str> = content.lines().map(str::trim_end).collect();
        assert_eq!(lines[0], "▾ a (3)");
        assert_eq!(lines[1], "├──▾ b (2)");
        assert_eq!(lines[2], "│  ├──  1");
        assert_eq!(lines[3], "│  └──  2");
        assert_eq!(lines[4], "└──▸ c (1)");
        assert_eq!(lines[5], "  z");
    }

    #[test]
    fn chosen_leaf_is_accented() {
        let rows = rows();
        let pane = PaneState::default();
        let theme = dark_theme();
        let chosen = KeyName::from("a:b:2");
        let area = Rect::new(0, 0, 30, 6);
        let mut buf = Buffer::empty(area);
        KeyTreeWidget::new(&rows, &pane, &theme)
            .selected_leaf(Some(&chosen))
            .render(area, &mut buf);

        assert_eq!(buf.cell((6, 3)).unwrap().fg, theme.accent_fg);
        assert_eq!(buf.cell((0, 0)).unwrap().bg, theme.selected_bg);
    }

    #[test]
    fn load_more_row_renders() {
        let rows = vec![TreeRow::load_more()];
        let pane = PaneState::default();
        let theme = dark_theme();
        let area = Rect::new(0, 0, 30, 1);
        let mut buf = Buffer::empty(area);
        KeyTreeWidget::new(&rows, &pane, &theme).render(area, &mut buf);
        assert!(buffer_to_string(&buf, area).contains("[+] Load more"));
    }
}
