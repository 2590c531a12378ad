use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, AppMode, InputKind};

/// Rows moved per wheel notch.
const WHEEL_STEP: isize = 3;

/// Handle a key event.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.kind == KeyEventKind::Release {
        return;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }
    match app.mode {
        AppMode::Input(_) => handle_input_key(app, key),
        AppMode::Help => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.mode = AppMode::Normal;
            }
        }
        AppMode::Normal => handle_normal_key(app, key),
    }
}

fn handle_normal_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Tab | KeyCode::BackTab => app.switch_view(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::PageDown => app.page_down(),
        KeyCode::PageUp => app.page_up(),
        KeyCode::Char('g') | KeyCode::Home => app.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.select_last(),
        KeyCode::Enter | KeyCode::Char(' ') => app.activate_selected(),
        KeyCode::Char('l') | KeyCode::Right => app.expand_selected(),
        KeyCode::Char('h') | KeyCode::Left => app.collapse_selected(),
        KeyCode::Char('m') => app.load_more(app.active),
        KeyCode::Char('/') => app.open_input(InputKind::Filter),
        KeyCode::Char('d') => app.open_input(InputKind::Delimiter),
        KeyCode::Char('r') => app.restart(),
        KeyCode::Esc if app.search.state().pattern.is_some() => app.set_filter(""),
        KeyCode::Char('?') => app.mode = AppMode::Help,
        _ => {}
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_input(),
        KeyCode::Esc => app.close_input(),
        KeyCode::Backspace => app.input_backspace(),
        KeyCode::Left => app.input_cursor_left(),
        KeyCode::Right => app.input_cursor_right(),
        KeyCode::Home => app.input.cursor_position = 0,
        KeyCode::End => app.input.cursor_position = app.input.input.len(),
        KeyCode::Char(c) => app.input_char(c),
        _ => {}
    }
}

/// Handle a mouse event. Only the wheel is bound.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    if app.mode != AppMode::Normal {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => app.move_selection(WHEEL_STEP),
        MouseEventKind::ScrollUp => app.move_selection(-WHEEL_STEP),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crossterm::event::KeyEventState;
    use tokio::sync::mpsc;

    use crate::browse::ViewId;
    use crate::config::AppConfig;
    use crate::keyspace::memory::MemoryKeyspace;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(
            Arc::new(MemoryKeyspace::from_names(["a:1"])),
            &AppConfig::default(),
            tx,
        )
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn q_quits() {
        let mut app = app();
        handle_key_event(&mut app, press(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn ctrl_c_quits_from_input() {
        let mut app = app();
        app.open_input(InputKind::Filter);
        handle_key_event(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(app.should_quit);
    }

    #[test]
    fn tab_switches_view() {
        let mut app = app();
        handle_key_event(&mut app, press(KeyCode::Tab));
        assert_eq!(app.active, ViewId::Tree);
        handle_key_event(&mut app, press(KeyCode::Tab));
        assert_eq!(app.active, ViewId::List);
    }

    #[test]
    fn typing_goes_to_prompt() {
        let mut app = app();
        handle_key_event(&mut app, press(KeyCode::Char('d')));
        assert_eq!(app.mode, AppMode::Input(InputKind::Delimiter));
        handle_key_event(&mut app, press(KeyCode::Backspace));
        handle_key_event(&mut app, press(KeyCode::Char('q')));
        assert!(!app.should_quit);
        assert_eq!(app.input.input, "q");
        handle_key_event(&mut app, press(KeyCode::Esc));
        assert_eq!(app.mode, AppMode::Normal);
    }

    #[test]
    fn submitting_delimiter_rebuilds_tree() {
        let mut app = app();
        handle_key_event(&mut app, press(KeyCode::Char('d')));
        handle_key_event(&mut app, press(KeyCode::Backspace));
        handle_key_event(&mut app, press(KeyCode::Char('/')));
        handle_key_event(&mut app, press(KeyCode::Enter));
        assert_eq!(app.tree.delimiter(), "/");
        assert_eq!(app.mode, AppMode::Normal);
    }

    #[test]
    fn help_toggles() {
        let mut app = app();
        handle_key_event(&mut app, press(KeyCode::Char('?')));
        assert_eq!(app.mode, AppMode::Help);
        handle_key_event(&mut app, press(KeyCode::Esc));
        assert_eq!(app.mode, AppMode::Normal);
    }

    #[test]
    fn release_events_are_ignored() {
        let mut app = app();
        let mut key = press(KeyCode::Char('q'));
        key.kind = KeyEventKind::Release;
        handle_key_event(&mut app, key);
        assert!(!app.should_quit);
    }
}
