use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use markdown_livesync_config::Config;
use markdown_livesync_engine::editing::{Block as DocBlock, NodeKind, TextBlock};
use markdown_livesync_engine::parsing::rope::Span as TextSpan;
use markdown_livesync_engine::{LiveSession, MarkupTag, Selection, Step, Transaction, VisualClass};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::{env, io::stdout, path::PathBuf, process};

struct App {
    path: PathBuf,
    session: LiveSession,
    status: String,
}

impl App {
    fn new(path: PathBuf, config: Config) -> Result<Self> {
        let source = if path.exists() {
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?
        } else {
            String::new()
        };
        log::debug!("loaded {} ({} bytes)", path.display(), source.len());
        let session = LiveSession::from_markdown(&source, config);
        Ok(Self {
            path,
            session,
            status: String::from("Esc: quit | Ctrl-S: save"),
        })
    }

    fn caret(&self) -> usize {
        self.session.document().selection().head
    }

    fn move_to(&mut self, pos: usize) {
        self.session.set_selection(Selection::caret(pos));
    }

    fn edit(&mut self, tx: Transaction) {
        match self.session.dispatch(&tx) {
            Ok(report) if report.promotions > 0 => {
                self.status = format!("promoted {} block(s)", report.promotions);
            }
            Ok(_) => {}
            Err(err) => self.status = format!("edit rejected: {err}"),
        }
    }

    fn insert(&mut self, text: &str) {
        let at = self.caret();
        self.edit(Transaction::new().insert(at, text));
    }

    fn enter(&mut self) {
        let at = self.caret();
        let raw = self
            .session
            .document()
            .block_at(at)
            .map(|b| matches!(b.block.kind, NodeKind::CodeBlock { .. } | NodeKind::MathBlock | NodeKind::HtmlBlock))
            .unwrap_or(false);
        if raw {
            self.insert("\n");
        } else {
            self.edit(Transaction::new().step(Step::SplitBlock { at }));
        }
    }

    fn backspace(&mut self) {
        let at = self.caret();
        let Some(block) = self.session.document().block_at(at).map(|b| b.block.clone()) else {
            return;
        };
        if at == block.span.start {
            self.edit(Transaction::new().step(Step::JoinBackward { node: block.id }));
            return;
        }
        let text = self.session.document().text();
        let prev = prev_boundary(&text, at);
        self.edit(Transaction::new().delete(TextSpan::new(prev, at)));
    }

    fn left(&mut self) {
        let text = self.session.document().text();
        let pos = prev_boundary(&text, self.caret());
        self.move_to(pos);
    }

    fn right(&mut self) {
        let text = self.session.document().text();
        let pos = next_boundary(&text, self.caret());
        self.move_to(pos);
    }

    fn vertical(&mut self, down: bool) {
        let text = self.session.document().text();
        let at = self.caret();
        let line_start = text[..at].rfind('\n').map_or(0, |i| i + 1);
        let column = text[line_start..at].chars().count();
        let target_start = if down {
            match text[at..].find('\n') {
                Some(i) => at + i + 1,
                None => return,
            }
        } else {
            if line_start == 0 {
                return;
            }
            text[..line_start - 1].rfind('\n').map_or(0, |i| i + 1)
        };
        let line_end = text[target_start..].find('\n').map_or(text.len(), |i| target_start + i);
        let pos = text[target_start..line_end]
            .char_indices()
            .nth(column)
            .map_or(line_end, |(i, _)| target_start + i);
        self.move_to(pos);
    }

    fn save(&mut self) {
        let markdown = self.session.document().to_markdown();
        self.status = match std::fs::write(&self.path, markdown) {
            Ok(()) => format!("saved {}", self.path.display()),
            Err(err) => format!("save failed: {err}"),
        };
    }

    /// Returns false when the app should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Char('q') if ctrl => return false,
            KeyCode::Char('s') if ctrl => self.save(),
            KeyCode::Char(c) if !ctrl => self.insert(&c.to_string()),
            KeyCode::Enter => self.enter(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Left => self.left(),
            KeyCode::Right => self.right(),
            KeyCode::Up => self.vertical(false),
            KeyCode::Down => self.vertical(true),
            _ => {}
        }
        true
    }
}

fn prev_boundary(text: &str, at: usize) -> usize {
    text[..at.min(text.len())]
        .char_indices()
        .next_back()
        .map_or(0, |(i, _)| i)
}

fn next_boundary(text: &str, at: usize) -> usize {
    text[at.min(text.len())..]
        .chars()
        .next()
        .map_or(text.len(), |c| at + c.len_utf8())
}

fn class_style(class: VisualClass) -> Style {
    let base = Style::default();
    match class {
        VisualClass::Strong => base.add_modifier(Modifier::BOLD),
        VisualClass::Em => base.add_modifier(Modifier::ITALIC),
        VisualClass::Del => base.add_modifier(Modifier::CROSSED_OUT),
        VisualClass::Code => base.fg(Color::Yellow),
        VisualClass::Heading(1) => base.fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        VisualClass::Heading(_) => base.fg(Color::Cyan).add_modifier(Modifier::BOLD),
        VisualClass::Link => base.fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
        VisualClass::Image | VisualClass::Math | VisualClass::Html => base.fg(Color::Magenta),
        VisualClass::Footnote => base.fg(Color::Green),
        VisualClass::Punctuation(_) | VisualClass::HeadingPunctuation(_) | VisualClass::LinkDestination => {
            base.fg(Color::DarkGray)
        }
        VisualClass::Widget(_) => base.fg(Color::Magenta).add_modifier(Modifier::ITALIC),
    }
}

/// Accumulates styled text, merging runs that share a style.
struct LineBuilder {
    lines: Vec<Line<'static>>,
    current: Vec<(String, Style)>,
}

impl LineBuilder {
    fn new(prefix: &str) -> Self {
        let mut builder = Self {
            lines: Vec::new(),
            current: Vec::new(),
        };
        builder.push(prefix, Style::default().fg(Color::DarkGray));
        builder
    }

    fn push(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        match self.current.last_mut() {
            Some((last, s)) if *s == style => last.push_str(text),
            _ => self.current.push((text.to_string(), style)),
        }
    }

    fn newline(&mut self, prefix: &str) {
        let spans = std::mem::take(&mut self.current)
            .into_iter()
            .map(|(t, s)| Span::styled(t, s))
            .collect::<Vec<_>>();
        self.lines.push(Line::from(spans));
        self.push(prefix, Style::default().fg(Color::DarkGray));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.newline("");
        self.current.clear();
        self.lines
    }
}

fn render_text(app: &App, out: &mut LineBuilder, block: &TextBlock, continuation: &str) {
    let doc = app.session.document();
    let set = app.session.decorations();
    let toggle = app.session.toggle();
    let caret = app.caret();
    let text = doc.slice(block.span);
    let caret_style = Style::default().add_modifier(Modifier::REVERSED);

    let mut pos = block.span.start;
    while pos < block.span.end {
        let mut style = Style::default();
        let mut skip_to = None;
        let mut widget = None;
        for (i, d) in set.at(pos) {
            if d.is_toggleable() && !toggle.is_revealed(i) {
                skip_to = Some(skip_to.unwrap_or(d.range.end).max(d.range.end));
                if d.range.start == pos {
                    widget = d.widget.as_ref().map(|w| (w.rendered.clone(), d.class));
                }
            } else {
                let class = if toggle.is_revealed(i) { d.revealed.unwrap_or(d.class) } else { d.class };
                style = style.patch(class_style(class));
            }
        }
        if let Some(end) = skip_to {
            if let Some((rendered, class)) = widget {
                out.push(&rendered, class_style(class));
            }
            pos = end.max(pos + 1);
            continue;
        }
        let Some(ch) = text[pos - block.span.start..].chars().next() else {
            break;
        };
        if pos == caret {
            style = style.patch(caret_style);
        }
        if ch == '\n' {
            if pos == caret {
                out.push(" ", caret_style);
            }
            out.newline(continuation);
        } else {
            out.push(ch.encode_utf8(&mut [0; 4]), style);
        }
        pos += ch.len_utf8();
    }
    if caret == block.span.end {
        out.push(" ", caret_style);
    }
}

fn render_document(app: &App) -> Vec<Line<'static>> {
    let doc = app.session.document();
    let mut lines = Vec::new();
    for block in doc.blocks() {
        match block {
            DocBlock::Text(t) => {
                let (first, rest) = match &t.kind {
                    NodeKind::ListItem { ordered: None } => ("• ".to_string(), "  "),
                    NodeKind::ListItem { ordered: Some(n) } => (format!("{n}. "), "   "),
                    NodeKind::BlockQuote => ("│ ".to_string(), "│ "),
                    NodeKind::CodeBlock { .. } | NodeKind::MathBlock => ("  ".to_string(), "  "),
                    _ => (String::new(), ""),
                };
                let mut out = LineBuilder::new(&first);
                render_text(app, &mut out, t, rest);
                lines.extend(out.finish());
            }
            DocBlock::Table(table) => {
                let rows = std::iter::once(&table.header).chain(table.rows.iter());
                for (r, cells) in rows.enumerate() {
                    let mut out = LineBuilder::new("│ ");
                    for (c, cell) in cells.iter().enumerate() {
                        if c > 0 {
                            out.push(" │ ", Style::default().fg(Color::DarkGray));
                        }
                        render_text(app, &mut out, cell, "");
                    }
                    lines.extend(out.finish());
                    if r == 0 {
                        lines.push(Line::from(Span::styled(
                            "├─",
                            Style::default().fg(Color::DarkGray),
                        )));
                    }
                }
            }
        }
        lines.push(Line::default());
    }
    lines
}

fn toolbar(app: &App) -> String {
    let active: Vec<&str> = [
        MarkupTag::Strong,
        MarkupTag::Em,
        MarkupTag::Del,
        MarkupTag::CodeSpan,
        MarkupTag::Link,
    ]
    .into_iter()
    .filter(|&tag| app.session.is_inside(tag))
    .map(|tag| tag.name())
    .collect();
    active.join(" ")
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());

    let title = format!(
        "{} (v{})",
        app.path.display(),
        app.session.document().version()
    );
    let content = Paragraph::new(render_document(app))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(ratatui::widgets::Wrap { trim: false });
    f.render_widget(content, chunks[0]);

    let diagnostics = app.session.diagnostics().len();
    let status = Line::from(vec![
        Span::raw(format!("{} | ", app.status)),
        Span::styled(toolbar(app), Style::default().fg(Color::Yellow)),
        Span::raw(if diagnostics > 0 {
            format!(" | {diagnostics} diagnostic(s)")
        } else {
            String::new()
        }),
    ]);
    let help = Paragraph::new(vec![status]).block(Block::default().borders(Borders::TOP));
    f.render_widget(help, chunks[1]);
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()>
where
    B::Error: std::error::Error + Send + Sync + 'static,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <file.md>", args[0]);
        process::exit(1);
    }
    let path = PathBuf::from(&args[1]);

    let config = match Config::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            eprintln!("Fix or remove {}", Config::config_path().display());
            process::exit(1);
        }
    };

    let mut app = App::new(path, config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

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
