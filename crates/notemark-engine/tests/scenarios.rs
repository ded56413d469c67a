use std::sync::Arc;

use notemark_engine::{
    Alignment, AttributeKind, Color, EditEvent, EditSession, EditorSettings, HighlightError,
    HighlighterProvider, OneShotFlags, PatternId, PatternLibrary, ProjectAssetResolver,
    RescanDecision, StyleAttribute, StyleEngine, StyledBuffer, TextRange, Token,
    TokenHighlighter, TokenizedString, classify,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

const TOKEN_COLOR: Color = Color::rgb(1, 2, 3);

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Echo,
    /// Echo plus tokens reaching past the end of the code.
    Overrun,
    Mangle,
    Panic,
    Fail,
}

struct FakeHighlighter(Behaviour);

impl TokenHighlighter for FakeHighlighter {
    fn highlight(
        &self,
        code: &str,
        _language: Option<&str>,
    ) -> Result<TokenizedString, HighlightError> {
        match self.0 {
            Behaviour::Echo => {
                let mut tokens = TokenizedString::new(code);
                tokens.push(code, TOKEN_COLOR, true, false);
                Ok(tokens)
            }
            Behaviour::Overrun => {
                let mut tokens = TokenizedString::new(code);
                tokens.push(code, TOKEN_COLOR, false, false);
                let len = tokens.tokens[0].range.length;
                for range in [TextRange::new(len - 1, 1000), TextRange::new(u32::MAX - 2, 10)] {
                    tokens.tokens.push(Token {
                        range,
                        foreground: TOKEN_COLOR,
                        bold: true,
                        italic: false,
                    });
                }
                Ok(tokens)
            }
            Behaviour::Mangle => Ok(TokenizedString::new(code.to_uppercase())),
            Behaviour::Panic => panic!("tokenizer exploded"),
            Behaviour::Fail => Err(HighlightError::Tokenizer {
                reason: "grammar missing".into(),
            }),
        }
    }

    fn supported_languages(&self) -> Vec<String> {
        vec!["js".into(), "rust".into()]
    }
}

struct FakeProvider(Arc<dyn TokenHighlighter>);

impl HighlighterProvider for FakeProvider {
    fn highlighter(&self, _dark: bool) -> Option<Arc<dyn TokenHighlighter>> {
        Some(self.0.clone())
    }
}

fn engine_with(settings: EditorSettings, behaviour: Behaviour) -> StyleEngine {
    StyleEngine::new(settings)
        .with_highlighters(Arc::new(FakeProvider(Arc::new(FakeHighlighter(behaviour)))))
}

fn session_with(settings: EditorSettings, behaviour: Behaviour) -> EditSession {
    EditSession::new(Arc::new(engine_with(settings, behaviour)))
}

const JS_BLOCK: &str = "```js\nconsole.log(1)\n```";

#[test]
fn scenario_full_buffer_insert_styles_code_block() {
    let mut buffer = StyledBuffer::new("");
    let edit = buffer.replace(TextRange::new(0, 0), JS_BLOCK).unwrap();
    assert_eq!(
        classify(&buffer.text(), &edit, &OneShotFlags::default()),
        RescanDecision::FullSync
    );

    let mut session = session_with(EditorSettings::default(), Behaviour::Echo);
    let writes = session.apply_edit(&mut buffer, edit);
    assert!(!writes.is_empty());

    for pos in [0, 6, 23] {
        let attrs = buffer.attributes_at(pos).unwrap();
        assert!(attrs.is_code_block(), "no code flag at {pos}");
        assert_eq!(attrs.code_language(), Some("js"));
    }
    let token = buffer.attributes_at(8).unwrap();
    assert_eq!(token.foreground(), Some(TOKEN_COLOR));
    assert!(token.font().unwrap().bold);
}

#[test]
fn scenario_initial_load_is_deferred() {
    let mut buffer = StyledBuffer::new(JS_BLOCK);
    let mut session = session_with(EditorSettings::default(), Behaviour::Echo);

    session.load(&mut buffer);
    assert!(session.has_deferred());
    assert!(!buffer.attributes_at(0).unwrap().is_code_block());

    session.run_deferred(&mut buffer).unwrap();
    assert_eq!(buffer.attributes_at(10).unwrap().code_language(), Some("js"));
}

#[test]
fn scenario_syntect_colors_javascript() {
    let engine = StyleEngine::new(EditorSettings::default());
    let mut buffer = StyledBuffer::new(JS_BLOCK);
    engine.full_rescan(&mut buffer);

    let attrs = buffer.attributes_at(6).unwrap();
    assert!(attrs.is_code_block());
    assert_eq!(attrs.code_language(), Some("js"));
}

#[test]
fn scenario_second_backtick_stays_local() {
    let mut buffer = StyledBuffer::new("hello `");
    let edit = buffer.replace(TextRange::new(7, 0), "`").unwrap();
    assert_eq!(
        classify(&buffer.text(), &edit, &OneShotFlags::default()),
        RescanDecision::ParagraphLocal(TextRange::new(0, 8))
    );

    let mut session = session_with(EditorSettings::default(), Behaviour::Echo);
    session.apply_edit(&mut buffer, edit);
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo);
    assert!(engine.code_blocks(&buffer.text()).is_empty());
    assert!(buffer.runs().iter().all(|(_, attrs)| !attrs.is_code_block()));
}

#[test]
fn scenario_torn_fence_goes_full() {
    let mut buffer = StyledBuffer::new("``code``");
    let edit = buffer.replace(TextRange::new(0, 1), "").unwrap();
    assert_eq!(buffer.text(), "`code``");

    let flags = OneShotFlags {
        last_removed_char: Some('`'),
        ..OneShotFlags::default()
    };
    assert_eq!(classify(&buffer.text(), &edit, &flags), RescanDecision::FullSync);
}

#[rstest]
#[case::default_cap(false, 5000, false)]
#[case::under_default_cap(false, 1000, true)]
#[case::simplified_cap(true, 1000, false)]
fn scenario_size_cap_forces_flat_styling(
    #[case] simplified: bool,
    #[case] units: usize,
    #[case] tokenized: bool,
) {
    let settings = EditorSettings {
        simplified_mode: simplified,
        ..EditorSettings::default()
    };
    let engine = engine_with(settings, Behaviour::Echo);
    let text = format!("```js\n{}```\n", "x\n".repeat(units / 2));
    let mut buffer = StyledBuffer::new(&text);
    engine.full_rescan(&mut buffer);

    let attrs = buffer.attributes_at(7).unwrap();
    assert!(attrs.is_code_block());
    assert_eq!(attrs.code_language().is_some(), tokenized);
    assert_eq!(attrs.foreground() == Some(TOKEN_COLOR), tokenized);
    assert_eq!(attrs.font().unwrap().family, "Source Code Pro");
}

#[test]
fn scenario_app_link() {
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo);
    let mut buffer = StyledBuffer::new("see [[Notes]]");
    engine.full_rescan(&mut buffer);

    let bracket = buffer.attributes_at(4).unwrap();
    let label = buffer.attributes_at(6).unwrap();
    assert_eq!(label.link(), Some("app://goto/Notes"));
    assert_eq!(bracket.link(), Some("app://goto/Notes"));
    assert_ne!(label.foreground(), bracket.foreground());
    assert_eq!(buffer.attributes_at(0).unwrap().link(), None);
}

#[test]
fn app_link_names_are_percent_encoded() {
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo);
    let mut buffer = StyledBuffer::new("[[Daily Log/2024]]");
    engine.full_rescan(&mut buffer);
    assert_eq!(
        buffer.attributes_at(3).unwrap().link(),
        Some("app://goto/Daily%20Log%2F2024")
    );
}

#[rstest]
#[case::mangled(Behaviour::Mangle)]
#[case::panicked(Behaviour::Panic)]
#[case::failed(Behaviour::Fail)]
fn tokenizer_failures_fall_back_to_flat(#[case] behaviour: Behaviour) {
    let engine = engine_with(EditorSettings::default(), behaviour);
    let mut buffer = StyledBuffer::new("```rust\nlet x = 1;\n```\nafter *it*");
    engine.full_rescan(&mut buffer);

    let code = buffer.attributes_at(10).unwrap();
    assert!(code.is_code_block());
    assert_eq!(code.code_language(), None);
    assert_ne!(code.foreground(), Some(TOKEN_COLOR));

    // Prose after the block is still styled.
    assert!(buffer.attributes_at(30).unwrap().font().unwrap().italic);
}

#[test]
fn tokens_past_the_code_are_clipped_to_the_buffer() {
    let engine = engine_with(EditorSettings::default(), Behaviour::Overrun);
    let mut buffer = StyledBuffer::new(JS_BLOCK);
    let writes = engine.full_rescan(&mut buffer);

    assert_eq!(buffer.text(), JS_BLOCK);
    assert_eq!(buffer.attributes().len(), buffer.len());
    assert!(writes.iter().all(|w| w.range.end() <= buffer.len()));

    let code = buffer.attributes_at(8).unwrap();
    assert!(code.is_code_block());
    assert_eq!(code.foreground(), Some(TOKEN_COLOR));
    // The overrunning token ends at the last character of the buffer.
    let last = buffer.attributes_at(buffer.len() - 1).unwrap();
    assert!(last.font().unwrap().bold);
}

#[test]
fn unsupported_languages_are_tokenized_as_plain() {
    let settings = EditorSettings {
        unsupported_languages: vec!["JS".into()],
        ..EditorSettings::default()
    };
    let engine = engine_with(settings, Behaviour::Echo);
    let mut buffer = StyledBuffer::new(JS_BLOCK);
    engine.full_rescan(&mut buffer);

    let attrs = buffer.attributes_at(8).unwrap();
    assert_eq!(attrs.code_language(), None);
    assert_eq!(attrs.foreground(), Some(TOKEN_COLOR));
}

#[test]
fn skip_highlighting_keeps_blocks_flat() {
    let settings = EditorSettings {
        skip_highlighting: true,
        ..EditorSettings::default()
    };
    let engine = engine_with(settings, Behaviour::Panic);
    let mut buffer = StyledBuffer::new(JS_BLOCK);
    engine.full_rescan(&mut buffer);
    assert!(buffer.attributes_at(8).unwrap().is_code_block());
    assert_eq!(buffer.attributes_at(8).unwrap().code_language(), None);
}

#[test]
fn hidden_syntax_collapses_markers_only() {
    let settings = EditorSettings {
        hide_syntax: true,
        ..EditorSettings::default()
    };
    let engine = engine_with(settings, Behaviour::Echo);
    let mut buffer = StyledBuffer::new("**bold** and # not a title\n```js\nx\n```");
    engine.full_rescan(&mut buffer);

    assert!(buffer.attributes_at(0).unwrap().is_hidden());
    assert!(buffer.attributes_at(7).unwrap().is_hidden());
    let content = buffer.attributes_at(2).unwrap();
    assert!(!content.is_hidden());
    assert!(content.font().unwrap().bold);

    // Fence ticks are hidden, the language token is not.
    assert!(buffer.attributes_at(27).unwrap().is_hidden());
    assert!(!buffer.attributes_at(30).unwrap().is_hidden());
}

#[test]
fn broken_pattern_disables_only_its_rule() {
    let (library, errors) = PatternLibrary::compile_with(|id| match id {
        PatternId::Bold => "(".to_string(),
        other => other.source(),
    });
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        HighlightError::PatternCompile { name: "bold", .. }
    ));
    assert!(!library.is_available(PatternId::Bold));

    let engine = engine_with(EditorSettings::default(), Behaviour::Echo)
        .with_patterns(Box::leak(Box::new(library)));
    let mut buffer = StyledBuffer::new("**b** *i*");
    engine.full_rescan(&mut buffer);

    assert!(!buffer.attributes_at(2).unwrap().font().unwrap().bold);
    assert!(buffer.attributes_at(7).unwrap().font().unwrap().italic);
}

#[test]
fn full_rescan_keeps_only_search_highlights() {
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo);
    let mut buffer = StyledBuffer::new("find `code` here");
    let yellow = Color::rgb(255, 230, 0);
    buffer
        .set_attribute(
            TextRange::new(0, 4),
            StyleAttribute::BackgroundColor {
                color: yellow,
                highlight: true,
            },
        )
        .unwrap();
    buffer
        .set_attribute(
            TextRange::new(5, 6),
            StyleAttribute::BackgroundColor {
                color: Color::rgb(240, 240, 240),
                highlight: false,
            },
        )
        .unwrap();

    engine.full_rescan(&mut buffer);

    assert_eq!(buffer.attributes_at(1).unwrap().background(), Some((yellow, true)));
    let code = buffer.attributes_at(7).unwrap();
    assert_eq!(code.background(), None);
    assert_eq!(code.font().unwrap().family, "Source Code Pro");
}

#[test]
fn host_writes_are_bounds_checked() {
    let mut buffer = StyledBuffer::new("abc");
    let err = buffer
        .set_attribute(TextRange::new(2, 5), StyleAttribute::Strikethrough)
        .unwrap_err();
    assert!(matches!(err, HighlightError::RangeOutOfBounds { buffer_len: 3, .. }));
}

#[test]
fn out_of_range_local_rescan_is_clamped() {
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo);
    let mut buffer = StyledBuffer::new("*a*\n*b*");
    engine.local_rescan(&mut buffer, TextRange::new(40, 3));
    assert!(buffer.attributes_at(5).unwrap().font().unwrap().italic);
}

#[test]
fn bare_project_paths_link_without_the_file() {
    let root = tempfile::tempdir().unwrap();
    let resolver = ProjectAssetResolver::new(root.path(), "daily/today.md");
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo)
        .with_resolver(Arc::new(resolver));
    let mut buffer = StyledBuffer::new("see /files/report.pdf now");
    engine.full_rescan(&mut buffer);

    let url = buffer.attributes_at(6).unwrap().link().unwrap();
    assert!(url.starts_with("file:///") && url.ends_with("/files/report.pdf"), "{url}");
    assert_eq!(buffer.attributes_at(2).unwrap().link(), None);

    // Without a notes folder there is nothing to resolve against.
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo);
    let mut buffer = StyledBuffer::new("see /files/report.pdf now");
    engine.full_rescan(&mut buffer);
    assert_eq!(buffer.attributes_at(6).unwrap().link(), None);
}

#[test]
fn images_resolve_through_the_project() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("i")).unwrap();
    std::fs::write(root.path().join("i/cat.png"), b"png").unwrap();

    let resolver = ProjectAssetResolver::new(root.path(), "daily/today.md");
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo)
        .with_resolver(Arc::new(resolver));
    let mut session = EditSession::new(Arc::new(engine));

    let text = "![cat](/i/cat.png) and ![dog](/i/dog.png)";
    let mut buffer = StyledBuffer::new("");
    session.edit(&mut buffer, TextRange::new(0, 0), text).unwrap();

    let cat = buffer.attributes_at(8).unwrap();
    let url = cat.link().unwrap();
    assert!(url.starts_with("file:///") && url.ends_with("/i/cat.png"), "{url}");
    let attachment = cat.attachment().unwrap();
    assert_eq!(attachment.source, "/i/cat.png");
    assert_eq!(attachment.url.as_deref(), Some(url));

    let dog = buffer.attributes_at(31).unwrap();
    assert_eq!(dog.link(), None);
    assert_eq!(dog.attachment().unwrap().url, None);

    // The dog appears; a keystroke next to it refreshes the attachment.
    std::fs::write(root.path().join("i/dog.png"), b"png").unwrap();
    let end = buffer.len();
    session.edit(&mut buffer, TextRange::new(end, 0), "!").unwrap();
    assert!(buffer.attributes_at(31).unwrap().attachment().unwrap().url.is_some());
}

#[test]
fn block_images_are_centered() {
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo);
    let mut buffer = StyledBuffer::new("![a](x.png)\ntext ![b](y.png)");
    engine.full_rescan(&mut buffer);

    let centered = |pos| match buffer.attribute_at(pos, AttributeKind::ParagraphStyle) {
        Some(StyleAttribute::ParagraphStyle(style)) => style.alignment == Alignment::Center,
        _ => false,
    };
    assert!(centered(0));
    assert!(!centered(20));
}

#[test]
fn attribute_only_edits_are_ignored() {
    let mut session = session_with(EditorSettings::default(), Behaviour::Echo);
    let mut buffer = StyledBuffer::new("*a*");
    let writes = session.apply_edit(&mut buffer, EditEvent::attributes(TextRange::new(0, 3)));
    assert!(writes.is_empty());
    assert!(buffer.attributes_at(1).unwrap().is_empty());
}

#[test]
fn style_dump_snapshot() {
    let engine = engine_with(EditorSettings::default(), Behaviour::Echo);
    let mut buffer = StyledBuffer::new("# Hi\nsee [[Notes]] `x`\n");
    engine.full_rescan(&mut buffer);

    insta::assert_snapshot!(buffer.dump(), @r##"
    0..2 "# " font=Helvetica Neue 28 bold fg=#8c959f
    2..4 "Hi" font=Helvetica Neue 28 bold fg=#1f2328
    4..9 "\nsee " font=Helvetica Neue 14 fg=#1f2328
    9..11 "[[" font=Helvetica Neue 14 fg=#8c959f link=app://goto/Notes
    11..16 "Notes" font=Helvetica Neue 14 fg=#0969da link=app://goto/Notes
    16..18 "]]" font=Helvetica Neue 14 fg=#8c959f link=app://goto/Notes
    18..19 " " font=Helvetica Neue 14 fg=#1f2328
    19..20 "`" font=Helvetica Neue 14 fg=#8c959f
    20..21 "x" font=Source Code Pro 13 fg=#cf222e
    21..22 "`" font=Helvetica Neue 14 fg=#8c959f
    22..23 "\n" font=Helvetica Neue 14 fg=#1f2328
    "##);
}
