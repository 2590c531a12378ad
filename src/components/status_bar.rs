use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::browse::ViewId;
use crate::components::fit;
use crate::theme::ThemeColors;

const KEY_HINTS: &str = " /:filter  d:delim  m:more  Tab:view  ?:help ";

/// Scan progress of the active view.
#[derive(Debug, Clone)]
pub struct ScanSummary<'a> {
    pub view: ViewId,
    pub loaded: usize,
    pub scanned: u64,
    pub total: Option<u64>,
    pub exhausted: bool,
    pub loading: bool,
    pub filter: Option<&'a str>,
    pub delimiter: &'a str,
}

impl ScanSummary<'_> {
    fn progress(&self) -> String {
        let total = self
            .total
            .map_or_else(|| "?".to_string(), |t| t.to_string());
        let state = if self.exhausted {
            "done"
        } else if self.loading {
            "loading…"
        } else {
            "more available"
        };
        format!(
            "{} keys  scanned {}/{}  {}",
            self.loaded, self.scanned, total, state
        )
    }

    fn context(&self) -> String {
        let mut parts = Vec::new();
        if let Some(filter) = self.filter {
            parts.push(format!("filter {}", filter));
        }
        if self.view == ViewId::Tree {
            parts.push(format!("delim \"{}\"", self.delimiter));
        }
        parts.join("  ")
    }
}

/// Bottom bar: view name, scan progress, filter/delimiter and key hints, or
/// a transient status message.
pub struct StatusBarWidget<'a> {
    summary: &'a ScanSummary<'a>,
    theme: &'a ThemeColors,
    status_message: Option<&'a str>,
    is_error: bool,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(summary: &'a ScanSummary<'a>, theme: &'a ThemeColors) -> Self {
        Self {
            summary,
            theme,
            status_message: None,
            is_error: false,
        }
    }

    pub fn status_message(mut self, msg: &'a str, is_error: bool) -> Self {
        self.status_message = Some(msg);
        self.is_error = is_error;
        self
    }
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let width = area.width as usize;

        if let Some(msg) = self.status_message {
            let style = if self.is_error {
                Style::default()
                    .bg(self.theme.error_fg)
                    .fg(self.theme.status_fg)
            } else {
                Style::default().fg(self.theme.success_fg)
            };
            let display = format!("{:<w$}", fit(msg, width), w = width);
            buf.set_line(area.x, area.y, &Line::from(Span::styled(display, style)), area.width);
            return;
        }

        let view = format!(" {} ", self.summary.view.label().to_uppercase());
        let progress = format!(" {} ", self.summary.progress());
        let context = self.summary.context();

        let hints = if width > view.len() + progress.len() + context.len() + KEY_HINTS.len() {
            KEY_HINTS
        } else {
            ""
        };
        let used = view.chars().count() + progress.chars().count() + hints.len();
        let context_display = fit(&context, width.saturating_sub(used));
        let gap = width
            .saturating_sub(used)
            .saturating_sub(context_display.chars().count());

        let spans = vec![
            Span::styled(
                view,
                Style::default()
                    .bg(self.theme.accent_fg)
                    .fg(self.theme.status_bg)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(progress, Style::default().fg(self.theme.status_fg)),
            Span::styled(context_display, Style::default().fg(self.theme.info_fg)),
            Span::raw(" ".repeat(gap)),
            Span::styled(
                hints,
                Style::default()
                    .fg(self.theme.dim_fg)
                    .add_modifier(Modifier::DIM),
            ),
        ];
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
