use notemark_config::EditorSettings;

use crate::buffer::{Color, Font};

/// Named style roles the highlighting rules paint with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleRole {
    Body,
    Title,
    Link,
    List,
    Syntax,
    Quote,
    Code,
    Html,
    Emoji,
}

/// Resolves style roles to concrete fonts and colors.
pub trait ThemeProvider: Send + Sync {
    fn is_dark(&self) -> bool;

    fn color(&self, role: StyleRole) -> Color;

    fn body_font(&self) -> Font;

    fn code_font(&self) -> Font;

    /// Bold body font scaled for a header of `level` 1 to 6.
    fn title_font(&self, level: u8) -> Font {
        let base = self.body_font();
        let scale = match level {
            1 => 2.0,
            2 => 1.6,
            3 => 1.35,
            4 => 1.2,
            5 => 1.1,
            _ => 1.0,
        };
        Font::new(base.family, base.size * scale).bold()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Palette {
    body: Color,
    title: Color,
    link: Color,
    list: Color,
    syntax: Color,
    quote: Color,
    code: Color,
    html: Color,
    emoji: Color,
}

const LIGHT: Palette = Palette {
    body: Color::rgb(0x1f, 0x23, 0x28),
    title: Color::rgb(0x1f, 0x23, 0x28),
    link: Color::rgb(0x09, 0x69, 0xda),
    list: Color::rgb(0x6e, 0x77, 0x81),
    syntax: Color::rgb(0x8c, 0x95, 0x9f),
    quote: Color::rgb(0x57, 0x60, 0x6a),
    code: Color::rgb(0xcf, 0x22, 0x2e),
    html: Color::rgb(0x11, 0x63, 0x29),
    emoji: Color::rgb(0x95, 0x38, 0x00),
};

const DARK: Palette = Palette {
    body: Color::rgb(0xe6, 0xed, 0xf3),
    title: Color::rgb(0xf0, 0xf6, 0xfc),
    link: Color::rgb(0x4a, 0x9e, 0xff),
    list: Color::rgb(0x8b, 0x94, 0x9e),
    syntax: Color::rgb(0x6e, 0x76, 0x81),
    quote: Color::rgb(0x9d, 0xa7, 0xb3),
    code: Color::rgb(0xff, 0x7b, 0x72),
    html: Color::rgb(0x7e, 0xe7, 0x87),
    emoji: Color::rgb(0xf0, 0x88, 0x3e),
};

/// The built-in light and dark themes, using the fonts from the editor
/// settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    dark: bool,
    body_font: Font,
    code_font: Font,
    palette: Palette,
}

impl Theme {
    pub fn from_settings(settings: &EditorSettings) -> Self {
        Self {
            dark: settings.dark_mode,
            body_font: Font::new(settings.body_font.clone(), settings.body_font_size),
            code_font: Font::new(settings.code_font.clone(), settings.code_font_size),
            palette: if settings.dark_mode { DARK } else { LIGHT },
        }
    }

    pub fn light() -> Self {
        Self::from_settings(&EditorSettings::default())
    }

    pub fn dark() -> Self {
        Self::from_settings(&EditorSettings {
            dark_mode: true,
            ..EditorSettings::default()
        })
    }
}

impl ThemeProvider for Theme {
    fn is_dark(&self) -> bool {
        self.dark
    }

    fn color(&self, role: StyleRole) -> Color {
        let p = &self.palette;
        match role {
            StyleRole::Body => p.body,
            StyleRole::Title => p.title,
            StyleRole::Link => p.link,
            StyleRole::List => p.list,
            StyleRole::Syntax => p.syntax,
            StyleRole::Quote => p.quote,
            StyleRole::Code => p.code,
            StyleRole::Html => p.html,
            StyleRole::Emoji => p.emoji,
        }
    }

    fn body_font(&self) -> Font {
        self.body_font.clone()
    }

    fn code_font(&self) -> Font {
        self.code_font.clone()
    }
}
