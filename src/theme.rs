//! Colors used by the widgets (Catppuccin Mocha).

use ratatui::style::Color;

use crate::keyspace::record::KeyType;

#[derive(Debug, Clone)]
pub struct ThemeColors {
    pub fg: Color,
    pub selected_bg: Color,
    pub selected_fg: Color,
    pub namespace_fg: Color,
    pub count_fg: Color,
    pub status_bg: Color,
    pub status_fg: Color,
    pub border_fg: Color,
    pub border_focused_fg: Color,
    pub error_fg: Color,
    pub success_fg: Color,
    pub info_fg: Color,
    pub accent_fg: Color,
    pub dim_fg: Color,
}

pub fn dark_theme() -> ThemeColors {
    ThemeColors {
        fg: Color::Rgb(205, 214, 244),          // text
        selected_bg: Color::Rgb(69, 71, 90),    // surface1
        selected_fg: Color::Rgb(205, 214, 244), // text
        namespace_fg: Color::Rgb(137, 180, 250), // blue
        count_fg: Color::Rgb(108, 112, 134),    // overlay0
        status_bg: Color::Rgb(49, 50, 68),      // surface0
        status_fg: Color::Rgb(205, 214, 244),
        border_fg: Color::Rgb(88, 91, 112),      // surface2
        border_focused_fg: Color::Rgb(137, 180, 250),
        error_fg: Color::Rgb(243, 139, 168),   // red
        success_fg: Color::Rgb(166, 227, 161), // green
        info_fg: Color::Rgb(137, 220, 235),    // sky
        accent_fg: Color::Rgb(203, 166, 247),  // mauve
        dim_fg: Color::Rgb(108, 112, 134),
    }
}

/// Badge color for a key type.
pub fn type_color(key_type: &KeyType) -> Color {
    match key_type {
        KeyType::String => Color::Rgb(166, 227, 161),
        KeyType::Hash => Color::Rgb(137, 180, 250),
        KeyType::List => Color::Rgb(250, 179, 135),
        KeyType::Set => Color::Rgb(249, 226, 175),
        KeyType::ZSet => Color::Rgb(245, 194, 231),
        KeyType::Stream => Color::Rgb(148, 226, 213),
        KeyType::Json => Color::Rgb(203, 166, 247),
        KeyType::None | KeyType::Other(_) => Color::Rgb(108, 112, 134),
    }
}
