use std::collections::BTreeMap;

use serde::Serialize;

/// Point size used to collapse hidden Markdown markers.
pub const HIDDEN_FONT_SIZE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Font {
    pub family: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl Font {
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        Self {
            family: family.into(),
            size,
            bold: false,
            italic: false,
        }
    }

    #[must_use]
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    #[must_use]
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Same family, collapsed to the hidden-marker size.
    #[must_use]
    pub fn hidden(&self) -> Self {
        Self::new(self.family.clone(), HIDDEN_FONT_SIZE)
    }

    pub fn is_hidden(&self) -> bool {
        self.size <= HIDDEN_FONT_SIZE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Alignment {
    Natural,
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParagraphStyle {
    pub head_indent: f32,
    pub alignment: Alignment,
}

/// An embedded object such as an inline image.
///
/// `source` is the reference exactly as written in the note; `url` is what the
/// asset resolver made of it, if anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub source: String,
    pub url: Option<String>,
}

/// Discriminant of [`StyleAttribute`], used as the key of an [`AttributeSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AttributeKind {
    Font,
    ForegroundColor,
    BackgroundColor,
    Link,
    CodeBlockFlag,
    CodeLanguage,
    Attachment,
    Strikethrough,
    ParagraphStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StyleAttribute {
    Font(Font),
    ForegroundColor(Color),
    /// `highlight` marks backgrounds owned by the host's search highlighting.
    BackgroundColor {
        color: Color,
        highlight: bool,
    },
    Link(String),
    CodeBlockFlag(bool),
    CodeLanguage(String),
    Attachment(Attachment),
    Strikethrough,
    ParagraphStyle(ParagraphStyle),
}

impl StyleAttribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            StyleAttribute::Font(_) => AttributeKind::Font,
            StyleAttribute::ForegroundColor(_) => AttributeKind::ForegroundColor,
            StyleAttribute::BackgroundColor { .. } => AttributeKind::BackgroundColor,
            StyleAttribute::Link(_) => AttributeKind::Link,
            StyleAttribute::CodeBlockFlag(_) => AttributeKind::CodeBlockFlag,
            StyleAttribute::CodeLanguage(_) => AttributeKind::CodeLanguage,
            StyleAttribute::Attachment(_) => AttributeKind::Attachment,
            StyleAttribute::Strikethrough => AttributeKind::Strikethrough,
            StyleAttribute::ParagraphStyle(_) => AttributeKind::ParagraphStyle,
        }
    }
}

/// The attributes on one run of text, at most one per [`AttributeKind`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeSet(BTreeMap<AttributeKind, StyleAttribute>);

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, kind: AttributeKind) -> Option<&StyleAttribute> {
        self.0.get(&kind)
    }

    pub fn contains(&self, kind: AttributeKind) -> bool {
        self.0.contains_key(&kind)
    }

    /// Inserts `attr`, replacing any attribute of the same kind.
    pub fn insert(&mut self, attr: StyleAttribute) -> Option<StyleAttribute> {
        self.0.insert(attr.kind(), attr)
    }

    pub fn remove(&mut self, kind: AttributeKind) -> Option<StyleAttribute> {
        self.0.remove(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleAttribute> {
        self.0.values()
    }

    pub fn font(&self) -> Option<&Font> {
        match self.get(AttributeKind::Font) {
            Some(StyleAttribute::Font(font)) => Some(font),
            _ => None,
        }
    }

    pub fn foreground(&self) -> Option<Color> {
        match self.get(AttributeKind::ForegroundColor) {
            Some(StyleAttribute::ForegroundColor(color)) => Some(*color),
            _ => None,
        }
    }

    pub fn background(&self) -> Option<(Color, bool)> {
        match self.get(AttributeKind::BackgroundColor) {
            Some(StyleAttribute::BackgroundColor { color, highlight }) => Some((*color, *highlight)),
            _ => None,
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self.get(AttributeKind::Link) {
            Some(StyleAttribute::Link(target)) => Some(target),
            _ => None,
        }
    }

    pub fn is_code_block(&self) -> bool {
        matches!(
            self.get(AttributeKind::CodeBlockFlag),
            Some(StyleAttribute::CodeBlockFlag(true))
        )
    }

    pub fn code_language(&self) -> Option<&str> {
        match self.get(AttributeKind::CodeLanguage) {
            Some(StyleAttribute::CodeLanguage(lang)) => Some(lang),
            _ => None,
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self.get(AttributeKind::Attachment) {
            Some(StyleAttribute::Attachment(attachment)) => Some(attachment),
            _ => None,
        }
    }

    /// True when the run is rendered invisible by syntax hiding.
    pub fn is_hidden(&self) -> bool {
        self.font().is_some_and(Font::is_hidden)
            && self.foreground().is_some_and(Color::is_transparent)
    }
}

impl std::fmt::Display for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.family, self.size)?;
        if self.bold {
            f.write_str(" bold")?;
        }
        if self.italic {
            f.write_str(" italic")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for StyleAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StyleAttribute::Font(font) => write!(f, "font={font}"),
            StyleAttribute::ForegroundColor(color) => write!(f, "fg={color}"),
            StyleAttribute::BackgroundColor { color, highlight } => {
                write!(f, "bg={color}")?;
                if *highlight {
                    f.write_str("(search)")?;
                }
                Ok(())
            }
            StyleAttribute::Link(target) => write!(f, "link={target}"),
            StyleAttribute::CodeBlockFlag(flag) => write!(f, "code-block={flag}"),
            StyleAttribute::CodeLanguage(lang) => write!(f, "lang={lang}"),
            StyleAttribute::Attachment(a) => match &a.url {
                Some(url) => write!(f, "attachment={}->{url}", a.source),
                None => write!(f, "attachment={}", a.source),
            },
            StyleAttribute::Strikethrough => f.write_str("strike"),
            StyleAttribute::ParagraphStyle(p) => {
                write!(f, "para={:?}+{}", p.alignment, p.head_indent)
            }
        }
    }
}

/// Space-separated attributes, in [`AttributeKind`] order.
impl std::fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, attr) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{attr}")?;
        }
        Ok(())
    }
}

impl FromIterator<StyleAttribute> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = StyleAttribute>>(iter: I) -> Self {
        let mut set = AttributeSet::new();
        for attr in iter {
            set.insert(attr);
        }
        set
    }
}
