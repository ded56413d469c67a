use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use notemark_config::{Config, EditorSettings};
use notemark_engine::{
    AttributeKind, AttributeSet, EditSession, ProjectAssetResolver, StyleEngine, StyledBuffer,
    TextRange,
    buffer::{Utf16Index, utf16::byte_offset, utf16_len},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use relative_path::RelativePathBuf;
use std::{
    env, fs,
    io::{Stdout, stdout},
    path::{Path, PathBuf},
    process,
    sync::Arc,
    time::Duration,
};

/// How long the event loop waits for a key before running a deferred rescan.
const IDLE_POLL: Duration = Duration::from_millis(50);

struct App {
    notes_path: PathBuf,
    note: RelativePathBuf,
    settings: EditorSettings,
    buffer: StyledBuffer,
    session: EditSession,
    /// UTF-16 offset into the buffer.
    cursor: u32,
    scroll: u16,
    dirty: bool,
    status: String,
}

fn build_session(
    notes_path: &Path,
    note: &RelativePathBuf,
    settings: &EditorSettings,
) -> EditSession {
    let resolver = ProjectAssetResolver::new(notes_path, note.clone());
    let engine = StyleEngine::new(settings.clone()).with_resolver(Arc::new(resolver));
    EditSession::new(Arc::new(engine))
}

impl App {
    fn new(notes_path: PathBuf, note: RelativePathBuf, settings: EditorSettings) -> Result<Self> {
        let path = note.to_path(&notes_path);
        let content = if path.exists() {
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read note {}", path.display()))?
        } else {
            String::new()
        };

        let mut buffer = StyledBuffer::new(&content);
        let mut session = build_session(&notes_path, &note, &settings);
        session.load(&mut buffer);

        Ok(Self {
            notes_path,
            note,
            settings,
            buffer,
            session,
            cursor: 0,
            scroll: 0,
            dirty: false,
            status: String::new(),
        })
    }

    fn run_deferred(&mut self) {
        if let Some(writes) = self.session.run_deferred(&mut self.buffer) {
            log::debug!("Deferred rescan wrote {} changes", writes.len());
        }
    }

    fn save(&mut self) -> Result<()> {
        let path = self.note.to_path(&self.notes_path);
        fs::write(&path, self.buffer.text().as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.dirty = false;
        self.status = format!("Saved {}", self.note);
        log::info!("Saved {}", path.display());
        Ok(())
    }

    /// Rebuilds the engine with the opposite `hide_syntax` and restyles.
    fn toggle_hide_syntax(&mut self) {
        self.settings.hide_syntax = !self.settings.hide_syntax;
        self.session = build_session(&self.notes_path, &self.note, &self.settings);
        self.session.engine().full_rescan(&mut self.buffer);
        self.status = if self.settings.hide_syntax {
            "Syntax hidden".to_string()
        } else {
            "Syntax shown".to_string()
        };
    }

    fn replace(&mut self, range: TextRange, replacement: &str) -> bool {
        match self.session.edit(&mut self.buffer, range, replacement) {
            Ok(_) => {
                self.dirty = true;
                true
            }
            Err(e) => {
                self.status = format!("Edit failed: {e}");
                false
            }
        }
    }

    fn insert(&mut self, text: &str) {
        if self.replace(TextRange::new(self.cursor, 0), text) {
            self.cursor += utf16_len(text);
        }
    }

    fn char_before(&self) -> Option<u32> {
        let text = self.buffer.text();
        let byte = byte_offset(&text, self.cursor)?;
        text[..byte]
            .chars()
            .next_back()
            .map(|c| c.len_utf16() as u32)
    }

    fn char_after(&self) -> Option<u32> {
        let text = self.buffer.text();
        let byte = byte_offset(&text, self.cursor)?;
        text[byte..].chars().next().map(|c| c.len_utf16() as u32)
    }

    fn backspace(&mut self) {
        if let Some(width) = self.char_before() {
            let start = self.cursor - width;
            if self.replace(TextRange::new(start, width), "") {
                self.cursor = start;
            }
        }
    }

    fn delete_forward(&mut self) {
        if let Some(width) = self.char_after() {
            self.replace(TextRange::new(self.cursor, width), "");
        }
    }

    fn move_left(&mut self) {
        if let Some(width) = self.char_before() {
            self.cursor -= width;
        }
    }

    fn move_right(&mut self) {
        if let Some(width) = self.char_after() {
            self.cursor += width;
        }
    }

    fn move_line_edge(&mut self, end: bool) {
        let text = self.buffer.text();
        let Some(byte) = byte_offset(&text, self.cursor) else {
            return;
        };
        let target = if end {
            text[byte..].find('\n').map_or(text.len(), |i| byte + i)
        } else {
            text[..byte].rfind('\n').map_or(0, |i| i + 1)
        };
        self.cursor = utf16_len(&text[..target]);
    }

    /// Moves to the same character column on the previous or next line.
    fn move_vertical(&mut self, down: bool) {
        let text = self.buffer.text();
        let Some(byte) = byte_offset(&text, self.cursor) else {
            return;
        };
        let line_start = text[..byte].rfind('\n').map_or(0, |i| i + 1);
        let column = text[line_start..byte].chars().count();

        let target_start = if down {
            match text[byte..].find('\n') {
                Some(i) => byte + i + 1,
                None => return,
            }
        } else if line_start == 0 {
            return;
        } else {
            text[..line_start - 1].rfind('\n').map_or(0, |i| i + 1)
        };
        let line_end = text[target_start..]
            .find('\n')
            .map_or(text.len(), |i| target_start + i);
        let target = text[target_start..line_end]
            .char_indices()
            .nth(column)
            .map_or(line_end, |(i, _)| target_start + i);

        self.cursor = utf16_len(&text[..target]);
    }

    /// Returns false when the app should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Char('q') if ctrl => return false,
            KeyCode::Char('s') if ctrl => {
                if let Err(e) = self.save() {
                    self.status = format!("Save failed: {e:#}");
                }
            }
            KeyCode::Char('t') if ctrl => self.toggle_hide_syntax(),
            KeyCode::Char('r') if ctrl => {
                self.session.force_full_rescan();
                self.status = "Next edit restyles the whole note".to_string();
            }
            KeyCode::Char(c) if !ctrl => self.insert(&c.to_string()),
            KeyCode::Enter => self.insert("\n"),
            KeyCode::Tab => self.insert("    "),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete_forward(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Up => self.move_vertical(false),
            KeyCode::Down => self.move_vertical(true),
            KeyCode::Home => self.move_line_edge(false),
            KeyCode::End => self.move_line_edge(true),
            _ => {}
        }
        true
    }
}

fn term_color(color: notemark_engine::Color) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

fn span_style(attrs: &AttributeSet) -> Style {
    let mut style = Style::default();
    if let Some(fg) = attrs.foreground()
        && !fg.is_transparent()
    {
        style = style.fg(term_color(fg));
    }
    if let Some((bg, _)) = attrs.background()
        && !bg.is_transparent()
    {
        style = style.bg(term_color(bg));
    }
    if let Some(font) = attrs.font() {
        if font.bold {
            style = style.add_modifier(Modifier::BOLD);
        }
        if font.italic {
            style = style.add_modifier(Modifier::ITALIC);
        }
    }
    if attrs.contains(AttributeKind::Strikethrough) {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    if attrs.link().is_some() {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

/// Renders attribute runs as terminal lines. Hidden markers are dropped.
fn styled_lines(buffer: &StyledBuffer) -> Vec<Line<'static>> {
    let text = buffer.text();
    let idx = Utf16Index::new(&text, 0);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();

    for (range, attrs) in buffer.attributes().runs() {
        let Some(bytes) = idx.byte_range(range) else {
            continue;
        };
        let run = &text[bytes];
        if attrs.is_hidden() {
            for _ in run.matches('\n') {
                lines.push(Line::from(std::mem::take(&mut current)));
            }
            continue;
        }

        let style = span_style(attrs);
        for (i, piece) in run.split('\n').enumerate() {
            if i > 0 {
                lines.push(Line::from(std::mem::take(&mut current)));
            }
            if !piece.is_empty() {
                current.push(Span::styled(piece.to_string(), style));
            }
        }
    }
    lines.push(Line::from(current));
    lines
}

/// Row and visible column of a UTF-16 cursor.
fn cursor_position(buffer: &StyledBuffer, cursor: u32) -> (u16, u16) {
    let text = buffer.text();
    let byte = byte_offset(&text, cursor).unwrap_or(text.len());
    let line_start = text[..byte].rfind('\n').map_or(0, |i| i + 1);
    let row = text[..line_start].matches('\n').count();

    let mut pos = utf16_len(&text[..line_start]);
    let mut column = 0usize;
    for ch in text[line_start..byte].chars() {
        if !buffer.attributes_at(pos).is_some_and(AttributeSet::is_hidden) {
            column += 1;
        }
        pos += ch.len_utf16() as u32;
    }

    (
        u16::try_from(row).unwrap_or(u16::MAX),
        u16::try_from(column).unwrap_or(u16::MAX),
    )
}

fn usage() -> ! {
    eprintln!("Usage: notemark-cli [--dump] <note.md>");
    process::exit(1);
}

fn main() -> Result<()> {
    // Warn only, so log lines do not smear the editor screen
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let mut dump = false;
    let mut note_arg = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--dump" => dump = true,
            _ if note_arg.is_none() => note_arg = Some(PathBuf::from(&arg)),
            _ => usage(),
        }
    }
    let Some(note_arg) = note_arg else { usage() };

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            eprintln!("Fix or remove {}", Config::config_path().display());
            process::exit(1);
        }
    };

    let note_path = std::path::absolute(&note_arg)
        .with_context(|| format!("Invalid note path {}", note_arg.display()))?;
    let note_dir = note_path
        .parent()
        .map(PathBuf::from)
        .context("Note path has no parent directory")?;

    // Notes outside the configured folder resolve images against their own directory
    let (notes_path, settings) = match config {
        Some(config) if note_path.starts_with(&config.notes_path) => {
            (config.notes_path, config.editor)
        }
        Some(config) => (note_dir, config.editor),
        None => (note_dir, EditorSettings::default()),
    };
    let note = RelativePathBuf::from_path(note_path.strip_prefix(&notes_path)?)?;
    log::info!("Opening {note} in {}", notes_path.display());

    let mut app = App::new(notes_path, note, settings)?;

    if dump {
        app.run_deferred();
        println!("{}", app.buffer.dump());
        return Ok(());
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        // Deferred full rescans run once the user pauses
        if !event::poll(IDLE_POLL)? {
            app.run_deferred();
            continue;
        }

        if let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && !app.handle_key(key)
        {
            return Ok(());
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(f.area());

    let editor_area = chunks[0];
    let visible_rows = editor_area.height.saturating_sub(2).max(1);
    let (row, column) = cursor_position(&app.buffer, app.cursor);
    if row < app.scroll {
        app.scroll = row;
    } else if row >= app.scroll + visible_rows {
        app.scroll = row - visible_rows + 1;
    }

    let title = format!("{}{}", app.note, if app.dirty { " *" } else { "" });
    let editor = Paragraph::new(styled_lines(&app.buffer))
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((app.scroll, 0));
    f.render_widget(editor, editor_area);

    f.set_cursor_position((
        editor_area.x + 1 + column,
        editor_area.y + 1 + row - app.scroll,
    ));

    // Instructions
    let help_text = Line::from(vec![
        Span::raw("Esc: Quit | "),
        Span::raw("Ctrl-S: Save | "),
        Span::raw("Ctrl-T: Toggle syntax | "),
        Span::raw("Ctrl-R: Full restyle | "),
        Span::styled(app.status.clone(), Style::default().fg(Color::Yellow)),
    ]);
    f.render_widget(Paragraph::new(vec![help_text]), chunks[1]);
}
