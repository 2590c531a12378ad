use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

use crate::app::{App, AppMode};
use crate::browse::{ViewId, ViewportWindow};
use crate::components::dialog::PromptWidget;
use crate::components::help::HelpWidget;
use crate::components::key_list::KeyListWidget;
use crate::components::key_tree::KeyTreeWidget;
use crate::components::status_bar::{ScanSummary, StatusBarWidget};
use crate::theme::{dark_theme, ThemeColors};

/// Render the application UI.
pub fn render(app: &mut App, frame: &mut Frame) {
    let theme = dark_theme();
    let area = frame.area();
    let [main, status] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);
    let [list_area, tree_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(main);

    render_list(app, frame, list_area, &theme);
    render_tree(app, frame, tree_area, &theme);
    render_status(app, frame, status, &theme);

    match app.mode {
        AppMode::Input(_) => frame.render_widget(PromptWidget::new(&app.mode, &app.input), area),
        AppMode::Help => frame.render_widget(HelpWidget::new(&theme), area),
        AppMode::Normal => {}
    }
}

fn pane_block<'a>(title: String, focused: bool, theme: &ThemeColors) -> Block<'a> {
    let color = if focused {
        theme.border_focused_fg
    } else {
        theme.border_fg
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

/// Scroll the pane, then report the rows about to be drawn.
fn report_window(app: &mut App, view: ViewId, height: usize, row_count: usize) {
    let pane = app.pane_mut(view);
    pane.update_scroll(height);
    let scroll = pane.scroll;
    if height == 0 || row_count == 0 || scroll >= row_count {
        return;
    }
    let stop = (scroll + height).min(row_count) - 1;
    app.on_rows_rendered(view, ViewportWindow::new(scroll, stop), row_count);
}

fn render_list(app: &mut App, frame: &mut Frame, area: Rect, theme: &ThemeColors) {
    let height = area.height.saturating_sub(2) as usize;
    app.page_height = height;
    let row_count = app.list_row_count();
    report_window(app, ViewId::List, height, row_count);

    let loaded = app.scans.state(ViewId::List).map_or(0, |s| s.len());
    let focused = app.active == ViewId::List;
    let rows = app.list_rows();
    let block = pane_block(format!(" Keys ({}) ", loaded), focused, theme);
    let widget = KeyListWidget::new(&rows, &app.list_pane, theme)
        .focused(focused)
        .block(block);
    frame.render_widget(widget, area);
}

fn render_tree(app: &mut App, frame: &mut Frame, area: Rect, theme: &ThemeColors) {
    let height = area.height.saturating_sub(2) as usize;
    let rows = app.tree_rows();
    report_window(app, ViewId::Tree, height, rows.len());

    let focused = app.active == ViewId::Tree;
    let title = if app.tree.is_building() {
        " Namespaces (building…) ".to_string()
    } else {
        format!(" Namespaces ({}) ", app.tree.tree().key_count())
    };
    let block = pane_block(title, focused, theme);
    let widget = KeyTreeWidget::new(&rows, &app.tree_pane, theme)
        .selected_leaf(app.tree.tree().selected_leaf.as_ref())
        .focused(focused)
        .block(block);
    frame.render_widget(widget, area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect, theme: &ThemeColors) {
    let view = app.active;
    let state = app.scans.state(view);
    let summary = ScanSummary {
        view,
        loaded: state.map_or(0, |s| s.len()),
        scanned: state.map_or(0, |s| s.scanned),
        total: state.and_then(|s| s.total),
        exhausted: app.scans.is_exhausted(view),
        loading: app.scans.is_in_flight(view)
            || (view == ViewId::Tree && app.tree.is_building()),
        filter: app.search.state().pattern.as_ref().map(|p| p.as_str()),
        delimiter: app.tree.delimiter(),
    };
    let mut widget = StatusBarWidget::new(&summary, theme);
    if let Some(msg) = &app.status_message {
        widget = widget.status_message(&msg.text, msg.is_error);
    }
    frame.render_widget(widget, area);
}
