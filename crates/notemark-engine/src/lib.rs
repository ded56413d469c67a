pub mod buffer;
pub mod classify;
pub mod code_block;
pub mod edit;
pub mod engine;
pub mod error;
pub mod highlight;
pub mod patterns;
pub mod placeholder;
pub mod resolver;
pub mod session;
pub mod theme;

// Re-export key types for easier usage
pub use buffer::{
    Alignment, Attachment, AttributeKind, AttributeSet, Color, Font, ParagraphStyle,
    StyleAttribute, StyledBuffer, TextRange,
};
pub use classify::{OneShotFlags, RescanDecision, classify};
pub use code_block::{
    CodeBlockKind, CodeBlockSpan, HighlighterProvider, HighlighterRegistry, NoHighlighter,
    Token, TokenHighlighter, TokenizedString,
};
pub use edit::EditEvent;
pub use engine::{StyleEngine, TextSnapshot};
pub use error::HighlightError;
pub use highlight::{APP_LINK_PREFIX, StyleChange, StyleWrite};
pub use patterns::{PatternId, PatternLibrary};
pub use placeholder::{
    PlaceholderMap, adjust_cursor_after_restore, adjust_cursor_for_protect, protect, restore,
};
pub use resolver::{AssetResolver, NoAssets, ProjectAssetResolver};
pub use session::EditSession;
pub use theme::{StyleRole, Theme, ThemeProvider};

pub use notemark_config::EditorSettings;
