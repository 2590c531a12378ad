use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Widget},
};

use crate::app::{AppMode, InputState};

/// Centered single-line prompt for the filter and delimiter inputs.
pub struct PromptWidget<'a> {
    mode: &'a AppMode,
    state: &'a InputState,
}

impl<'a> PromptWidget<'a> {
    pub fn new(mode: &'a AppMode, state: &'a InputState) -> Self {
        Self { mode, state }
    }
}

/// A `width` x `height` rectangle centered in `area`.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let x = area.x + area.width.saturating_sub(w) / 2;
    let y = area.y + area.height.saturating_sub(h) / 2;
    Rect::new(x, y, w, h)
}

impl<'a> Widget for PromptWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let AppMode::Input(kind) = self.mode else {
            return;
        };

        let rect = centered_rect(50.min(area.width.saturating_sub(4)), 5, area);
        Clear.render(rect, buf);
        let block = Block::default()
            .title(format!(" {} ", kind.title()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .padding(Padding::horizontal(1));
        let inner = block.inner(rect);
        block.render(rect, buf);
        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let input = &self.state.input;
        let cursor = self.state.cursor_position.min(input.len());
        let before = &input[..cursor];
        let mut rest = input[cursor..].chars();
        let cursor_char = rest.next().map_or(" ".to_string(), |c| c.to_string());
        let after: String = rest.collect();

        // Keep the cursor visible by dropping characters from the left.
        let max_width = inner.width as usize;
        let before_chars = before.chars().count();
        let room = max_width.saturating_sub(1);
        let before_display: String = if before_chars > room {
            before.chars().skip(before_chars - room).collect()
        } else {
            before.to_string()
        };

        let input_style = Style::default().fg(Color::White);
        let cursor_style = Style::default()
            .bg(Color::White)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD);
        let line = Line::from(vec![
            Span::styled(before_display, input_style),
            Span::styled(cursor_char, cursor_style),
            Span::styled(after, input_style),
        ]);
        buf.set_line(inner.x, inner.y + inner.height / 2, &line, inner.width);

        if inner.height > 1 {
            let hint = Line::from(Span::styled(
                "[Enter] Apply  [Esc] Cancel",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::DIM),
            ));
            buf.set_line(inner.x, inner.y + inner.height - 1, &hint, inner.width);
        }
    }
}
