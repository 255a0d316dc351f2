use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use arboard::Clipboard;
use chrono::{Local, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use directories::ProjectDirs;
use inventory_core::assistant::{self, AnswerService, Conversation, GeminiClient, Role};
use inventory_core::sheet_link;
use inventory_core::{
    AssistantConfig, Autocomplete, HttpFetcher, InventoryState, SearchConfig, Section,
    SheetFetcher, StatusKind, SyncConfig, SyncMode, SyncScheduler,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

mod logging;
mod store;

const TICK_MS: u64 = 100;
const RECENT_ITEMS: usize = 8;
const ASSISTANT_UNAVAILABLE: &str =
    "The assistant is not configured. Set INVENTORY_ASSISTANT_API_KEY and restart.";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let data_dir = ProjectDirs::from("com", "sheetinventory", "Sheet Inventory")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"));
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    let log_path = logging::init_logging(&data_dir.join("logs"))?;
    let config = load_config(&data_dir.join("config.toml"))?;
    info!(log = %log_path.display(), "starting inventory dashboard");

    let store = store::open_store(&data_dir.join("inventory.db"))
        .context("Failed to open local inventory store")?;
    let state = InventoryState::load(store, &config.sync.default_link);

    let fetcher: Arc<dyn SheetFetcher> = Arc::new(HttpFetcher::new(Duration::from_secs(
        config.sync.request_timeout_secs,
    ))?);
    let scheduler = SyncScheduler::new(fetcher, Duration::from_secs(config.sync.interval_secs));

    let assistant: Option<Arc<dyn AnswerService>> = match GeminiClient::from_env(&config.assistant) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            warn!(error = %err, "assistant disabled");
            None
        }
    };

    let mut app = App::new(state, scheduler, &config, assistant);
    app.activate_link();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    info!("inventory dashboard closed");

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = TICK_MS.saturating_sub(last_tick.elapsed().as_millis() as u64);
        if event::poll(Duration::from_millis(timeout))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(app, key) {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= Duration::from_millis(TICK_MS) {
            app.tick();
            last_tick = Instant::now();
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        return true;
    }
    if ctrl && key.code == KeyCode::Char('r') {
        app.sync_now();
        return false;
    }
    if let Some(section) = section_for_function_key(key.code) {
        app.switch_section(section);
        return false;
    }

    app.notice = None;
    match app.state.section() {
        Section::Dashboard => handle_dashboard_key(app, key),
        Section::Query => handle_query_key(app, key),
        Section::Inventory => handle_inventory_key(app, key),
        Section::Settings => handle_settings_key(app, key),
    }
}

fn section_for_function_key(code: KeyCode) -> Option<Section> {
    match code {
        KeyCode::F(n @ 1..=4) => Section::ALL.get(usize::from(n) - 1).copied(),
        _ => None,
    }
}

fn section_for_digit(code: KeyCode) -> Option<Section> {
    match code {
        KeyCode::Char(ch @ '1'..='4') => {
            let index = ch.to_digit(10)? as usize - 1;
            Section::ALL.get(index).copied()
        }
        _ => None,
    }
}

fn handle_dashboard_key(app: &mut App, key: KeyEvent) -> bool {
    if let Some(section) = section_for_digit(key.code) {
        app.switch_section(section);
        return false;
    }
    match key.code {
        KeyCode::Char('q') => true,
        KeyCode::Char('r') => {
            app.sync_now();
            false
        }
        KeyCode::Char('/') => {
            app.switch_section(Section::Query);
            false
        }
        _ => false,
    }
}

fn handle_inventory_key(app: &mut App, key: KeyEvent) -> bool {
    if let Some(section) = section_for_digit(key.code) {
        app.switch_section(section);
        return false;
    }
    match key.code {
        KeyCode::Char('q') => true,
        KeyCode::Char('r') => {
            app.sync_now();
            false
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.inventory_move(-1);
            false
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.inventory_move(1);
            false
        }
        KeyCode::PageUp => {
            app.inventory_move(-10);
            false
        }
        KeyCode::PageDown => {
            app.inventory_move(10);
            false
        }
        KeyCode::Home => {
            app.inventory_selection = 0;
            false
        }
        KeyCode::End => {
            app.inventory_selection = app.state.records().len().saturating_sub(1);
            false
        }
        KeyCode::Enter => {
            app.open_inventory_item();
            false
        }
        _ => false,
    }
}

fn handle_query_key(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Tab || key.code == KeyCode::BackTab {
        app.toggle_query_focus();
        return false;
    }

    match app.query_focus {
        QueryFocus::Search => match key.code {
            KeyCode::Esc => {
                if app.autocomplete.is_open() {
                    app.autocomplete.dismiss();
                } else {
                    app.autocomplete.set_query("", app.state.records());
                }
            }
            KeyCode::Up => app.autocomplete.move_highlight(-1),
            KeyCode::Down => app.autocomplete.move_highlight(1),
            KeyCode::Enter => app.select_suggestion(),
            KeyCode::Backspace => app.autocomplete.pop_char(app.state.records()),
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.autocomplete.push_char(ch, app.state.records());
            }
            _ => {}
        },
        QueryFocus::Question => match key.code {
            KeyCode::Esc => app.question_input.clear(),
            KeyCode::Enter => app.submit_question(),
            KeyCode::Backspace => {
                app.question_input.pop();
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.question_input.push(ch);
            }
            _ => {}
        },
    }
    false
}

fn handle_settings_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('v') if ctrl => app.paste_link(),
        KeyCode::Char('u') if ctrl => app.link_input.clear(),
        KeyCode::Char(ch) if !ctrl => app.link_input.push(ch),
        KeyCode::Backspace => {
            app.link_input.pop();
        }
        KeyCode::Esc => app.link_input = app.state.source_link().to_string(),
        KeyCode::Enter => app.save_link(),
        _ => {}
    }
    false
}

fn ui(frame: &mut ratatui::Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(frame.size());

    frame.render_widget(render_tabs(app), chunks[0]);
    match app.state.section() {
        Section::Dashboard => render_dashboard(frame, app, chunks[1]),
        Section::Query => render_query(frame, app, chunks[1]),
        Section::Inventory => render_inventory(frame, app, chunks[1]),
        Section::Settings => render_settings(frame, app, chunks[1]),
    }
    frame.render_widget(render_footer(app), chunks[2]);
}

fn highlight_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

fn active_border(active: bool) -> Style {
    if active {
        Style::default()
            .fg(Color::Blue)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn render_tabs(app: &App) -> Paragraph<'_> {
    let mut spans = Vec::new();
    for (idx, section) in Section::ALL.iter().enumerate() {
        let label = format!(" F{} {} ", idx + 1, section.label());
        if *section == app.state.section() {
            spans.push(Span::styled(label, highlight_style().add_modifier(Modifier::REVERSED)));
        } else {
            spans.push(Span::raw(label));
        }
        spans.push(Span::raw(" "));
    }
    if app.state.is_syncing() {
        spans.push(Span::styled(
            "  Syncing...",
            Style::default().fg(Color::Yellow),
        ));
    }

    Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Sheet Inventory"))
}

fn status_line(app: &App) -> Option<Line<'_>> {
    let status = app.state.status()?;
    let color = match status.kind {
        StatusKind::Success => Color::Green,
        StatusKind::Error => Color::Red,
    };
    Some(Line::from(Span::styled(
        status.message.as_str(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )))
}

fn render_dashboard(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(3)].as_ref())
        .split(area);

    let mut text = Text::default();
    text.lines.push(Line::from(format!("Items:        {}", app.state.records().len())));
    text.lines.push(Line::from(format!("Total units:  {}", app.state.total_units())));
    text.lines.push(Line::from(format!("Locations:    {}", app.state.location_count())));
    let updated = app
        .state
        .last_updated()
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "not updated this session".to_string());
    text.lines.push(Line::from(format!("Last update:  {updated}")));
    let source = if app.state.source_link().is_empty() {
        "no source link configured (F4)"
    } else {
        app.state.source_link()
    };
    text.lines.push(Line::from(format!("Source:       {source}")));
    if let Some(line) = status_line(app) {
        text.lines.push(Line::from(""));
        text.lines.push(line);
    }

    let stats = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Overview"))
        .wrap(Wrap { trim: false });
    frame.render_widget(stats, chunks[0]);

    let mut recent = Text::default();
    if app.state.records().is_empty() {
        recent.lines.push(Line::from("No items yet"));
    }
    for record in app.state.records().iter().take(RECENT_ITEMS) {
        recent.lines.push(Line::from(format!(
            "{:>6}  {} | {}",
            record.quantity, record.name, record.location
        )));
    }
    let recent = Paragraph::new(recent)
        .block(Block::default().borders(Borders::ALL).title("Items"))
        .wrap(Wrap { trim: true });
    frame.render_widget(recent, chunks[1]);
}

fn render_query(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(area);

    let suggestion_height = if app.autocomplete.is_open() {
        app.autocomplete.suggestions().len().max(1) as u16 + 2
    } else {
        0
    };
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(suggestion_height),
                Constraint::Min(3),
            ]
            .as_ref(),
        )
        .split(columns[0]);

    let search = Paragraph::new(app.autocomplete.query()).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search by name or code")
            .border_style(active_border(app.query_focus == QueryFocus::Search)),
    );
    frame.render_widget(search, left[0]);

    if app.autocomplete.is_open() {
        let mut text = Text::default();
        if app.autocomplete.suggestions().is_empty() {
            text.lines.push(Line::from("No matches"));
        }
        for (idx, record) in app.autocomplete.suggestions().iter().enumerate() {
            let selected = idx == app.autocomplete.highlighted();
            let line = format!(
                "{} {}  [{}]  qty {}",
                if selected { ">" } else { " " },
                record.name,
                record.code,
                record.quantity
            );
            if selected {
                text.lines.push(Line::from(Span::styled(line, highlight_style())));
            } else {
                text.lines.push(Line::from(line));
            }
        }
        let list = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
        frame.render_widget(list, left[1]);
    }

    frame.render_widget(render_detail(app), left[2]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(columns[1]);
    render_conversation(frame, app, right[0]);

    let title = if app.assistant.is_some() {
        "Ask the assistant"
    } else {
        "Ask the assistant (not configured)"
    };
    let question = Paragraph::new(app.question_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(active_border(app.query_focus == QueryFocus::Question)),
    );
    frame.render_widget(question, right[1]);
}

fn render_detail(app: &App) -> Paragraph<'_> {
    let mut text = Text::default();
    match app.state.selected() {
        Some(record) => {
            text.lines.push(Line::from(Span::styled(
                record.name.as_str(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            text.lines.push(Line::from(format!("{} | {}", record.code, record.category)));
            text.lines.push(Line::from(""));
            text.lines.push(Line::from(format!("Quantity:     {}", record.quantity)));
            text.lines.push(Line::from(format!("Location:     {}", record.location)));
            text.lines.push(Line::from(format!("Responsible:  {}", record.responsible)));
            text.lines.push(Line::from(format!(
                "In inventory: {}",
                record.time_in_inventory(Utc::now())
            )));
            if let Some(link) = &record.link {
                text.lines.push(Line::from(format!("Document:     {link}")));
            }
        }
        None => text
            .lines
            .push(Line::from("Search for an item and press Enter to see its details.")),
    }

    Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Item"))
        .wrap(Wrap { trim: false })
}

fn render_conversation(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    for entry in app.conversation.entries() {
        let (label, color) = match entry.role {
            Role::User => ("You", Color::Cyan),
            Role::Assistant => ("Assistant", Color::Green),
            Role::System => ("System", Color::Red),
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("{label} ({}): ", entry.at.with_timezone(&Local).format("%H:%M")),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::raw(entry.text.as_str()),
        ]));
    }
    if app.conversation.is_pending() {
        lines.push(Line::from(Span::styled(
            "Assistant is thinking...",
            Style::default().fg(Color::Yellow),
        )));
    }
    if lines.is_empty() {
        lines.push(Line::from("Ask about stock levels, locations or who is responsible."));
    }

    let available = area.height.saturating_sub(2) as usize;
    let start = lines.len().saturating_sub(available);
    let text = Text::from(lines.split_off(start));
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Assistant"))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn render_inventory(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let records = app.state.records();
    let title = format!("Inventory ({} items, {} units)", records.len(), app.state.total_units());
    if records.is_empty() {
        let empty = Paragraph::new("No items. Configure a sheet in Settings (F4).")
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(empty, area);
        return;
    }

    let available = area.height.saturating_sub(3) as usize;
    let total = records.len();
    let mut start = app.inventory_selection.saturating_sub(available / 2);
    if available > 0 && start + available > total {
        start = total.saturating_sub(available);
    }
    let end = (start + available).min(total);

    let rows = records[start..end].iter().enumerate().map(|(idx, record)| {
        let row = Row::new(vec![
            Cell::from(record.quantity.to_string()),
            Cell::from(record.name.as_str()),
            Cell::from(record.location.as_str()),
            Cell::from(record.responsible.as_str()),
            Cell::from(if record.link.is_some() { "yes" } else { "-" }),
        ]);
        if start + idx == app.inventory_selection {
            row.style(highlight_style())
        } else {
            row
        }
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Percentage(32),
            Constraint::Percentage(30),
            Constraint::Percentage(22),
            Constraint::Length(5),
        ],
    )
    .header(
        Row::new(vec!["Qty", "Name", "Location", "Responsible", "Doc"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(table, area);
}

fn render_settings(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)].as_ref())
        .split(area);

    let input = Paragraph::new(app.link_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Google Sheets link")
            .border_style(active_border(true)),
    );
    frame.render_widget(input, chunks[0]);

    let mut text = Text::default();
    match sheet_link::export_url(&app.link_input) {
        Ok(url) => text.lines.push(Line::from(format!("Export URL: {url}"))),
        Err(err) => text.lines.push(Line::from(err.to_string())),
    }
    text.lines.push(Line::from(format!(
        "The sheet is re-read every {} seconds while the link is active.",
        app.scheduler.interval().as_secs()
    )));
    text.lines.push(Line::from(
        "Columns: quantity, name, location, responsible, document link (optional).",
    ));
    text.lines.push(Line::from(""));
    if app.link_input.trim() != app.state.source_link() {
        text.lines.push(Line::from(Span::styled(
            "Unsaved changes. Press Enter to save and load.",
            Style::default().fg(Color::Yellow),
        )));
    }
    if app.state.is_syncing() {
        text.lines.push(Line::from("Connecting..."));
    } else if let Some(line) = status_line(app) {
        text.lines.push(line);
    }
    if let Some(notice) = &app.notice {
        text.lines.push(Line::from(Span::styled(
            notice.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }

    let info = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Data source"))
        .wrap(Wrap { trim: false });
    frame.render_widget(info, chunks[1]);
}

fn render_footer(app: &App) -> Paragraph<'_> {
    let info = match app.state.section() {
        Section::Dashboard => "1-4/F1-F4 sections | / search | r sync | q quit | Ctrl+Q quit",
        Section::Query => match app.query_focus {
            QueryFocus::Search => {
                "type to search | Up/Down move | Enter select | Esc close | Tab assistant | F1-F4 sections | Ctrl+Q quit"
            }
            QueryFocus::Question => "type a question | Enter ask | Esc clear | Tab search | F1-F4 sections | Ctrl+Q quit",
        },
        Section::Inventory => "Up/Down or j/k move | Enter details | r sync | 1-4/F1-F4 sections | q quit",
        Section::Settings => "Enter save and load | Ctrl+V paste | Ctrl+U clear | Esc revert | Ctrl+R sync | F1-F4 sections",
    };

    Paragraph::new(info).block(Block::default().borders(Borders::ALL).title("Keys"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryFocus {
    Search,
    Question,
}

struct App {
    state: InventoryState,
    scheduler: SyncScheduler,
    autocomplete: Autocomplete,
    query_focus: QueryFocus,
    question_input: String,
    conversation: Conversation,
    assistant: Option<Arc<dyn AnswerService>>,
    assistant_tx: Sender<Result<String, String>>,
    assistant_rx: Receiver<Result<String, String>>,
    inventory_selection: usize,
    link_input: String,
    notice: Option<String>,
}

impl App {
    fn new(
        state: InventoryState,
        scheduler: SyncScheduler,
        config: &ConfigFile,
        assistant: Option<Arc<dyn AnswerService>>,
    ) -> Self {
        let (assistant_tx, assistant_rx) = mpsc::channel();
        let link_input = state.source_link().to_string();
        Self {
            state,
            scheduler,
            autocomplete: Autocomplete::new(config.search.max_suggestions),
            query_focus: QueryFocus::Search,
            question_input: String::new(),
            conversation: Conversation::new(Duration::from_secs(config.assistant.inactivity_secs)),
            assistant,
            assistant_tx,
            assistant_rx,
            inventory_selection: 0,
            link_input,
            notice: None,
        }
    }

    /// Starts background polling for the current source link.
    fn activate_link(&mut self) {
        self.scheduler.rearm(self.state.source_link());
    }

    fn tick(&mut self) {
        if self.scheduler.apply_pending(&mut self.state) {
            if self.autocomplete.is_open() {
                self.autocomplete.refresh(self.state.records());
            }
            self.inventory_move(0);
        }

        loop {
            match self.assistant_rx.try_recv() {
                Ok(answer) => self.conversation.resolve(answer, Utc::now()),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.conversation.expire();
    }

    fn switch_section(&mut self, section: Section) {
        self.autocomplete.dismiss();
        self.state.set_section(section);
    }

    /// At most one interactive fetch runs per link. A fetch for a link that
    /// was replaced since is superseded by the scheduler, see `save_link`.
    fn sync_now(&mut self) {
        if self.state.is_syncing() {
            return;
        }
        self.start_interactive_sync();
    }

    fn start_interactive_sync(&mut self) {
        self.state.begin_sync(SyncMode::Interactive);
        self.scheduler.trigger(self.state.source_link());
    }

    fn save_link(&mut self) {
        let changed = self.state.set_source_link(&self.link_input);
        self.link_input = self.state.source_link().to_string();
        if changed {
            self.activate_link();
            self.start_interactive_sync();
        } else {
            self.sync_now();
        }
    }

    fn paste_link(&mut self) {
        let text = Clipboard::new()
            .ok()
            .and_then(|mut clipboard| clipboard.get_text().ok())
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        match text {
            Some(text) => self.link_input = text,
            None => self.notice = Some("Clipboard is empty or unavailable".to_string()),
        }
    }

    fn toggle_query_focus(&mut self) {
        self.autocomplete.dismiss();
        self.query_focus = match self.query_focus {
            QueryFocus::Search => QueryFocus::Question,
            QueryFocus::Question => QueryFocus::Search,
        };
    }

    fn select_suggestion(&mut self) {
        if let Some(record) = self.autocomplete.select_highlighted() {
            self.state.select(record);
        }
    }

    fn submit_question(&mut self) {
        let now = Utc::now();
        let Some(question) = self.conversation.submit(&self.question_input, now) else {
            return;
        };
        self.question_input.clear();

        let Some(service) = self.assistant.as_ref().map(Arc::clone) else {
            self.conversation.resolve(Err(ASSISTANT_UNAVAILABLE.to_string()), now);
            return;
        };
        let records = self.state.records().to_vec();
        let tx = self.assistant_tx.clone();
        thread::spawn(move || {
            let answer = assistant::ask(service.as_ref(), &question, &records);
            let _ = tx.send(answer);
        });
    }

    fn inventory_move(&mut self, delta: i32) {
        let len = self.state.records().len() as i32;
        if len == 0 {
            self.inventory_selection = 0;
            return;
        }
        let idx = (self.inventory_selection as i32 + delta).clamp(0, len - 1);
        self.inventory_selection = idx as usize;
    }

    fn open_inventory_item(&mut self) {
        let Some(record) = self.state.records().get(self.inventory_selection).cloned() else {
            return;
        };
        self.autocomplete.set_query(&record.name, self.state.records());
        self.autocomplete.dismiss();
        self.state.select(record);
        self.query_focus = QueryFocus::Search;
        self.state.set_section(Section::Query);
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    sync: SyncConfig,
    search: SearchConfig,
    assistant: AssistantConfig,
}

fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let mut cfg: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        cfg.sync = cfg.sync.normalized();
        Ok(cfg)
    } else {
        let cfg = ConfigFile::default();
        let content = toml::to_string_pretty(&cfg).context("Failed to serialize default config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use inventory_core::{AssistantError, MemoryStore, SyncError};

    use super::*;

    const LINK: &str = "https://docs.google.com/spreadsheets/d/abc/edit?usp=sharing";

    struct FixedSheet(&'static str);

    impl SheetFetcher for FixedSheet {
        fn fetch(&self, _url: &str) -> std::result::Result<String, SyncError> {
            Ok(self.0.to_string())
        }
    }

    struct Echo;

    impl AnswerService for Echo {
        fn generate(&self, _system: &str, prompt: &str) -> std::result::Result<String, AssistantError> {
            Ok(format!("echo: {}", prompt.len()))
        }
    }

    struct SlowSheet(Duration);

    impl SheetFetcher for SlowSheet {
        fn fetch(&self, _url: &str) -> std::result::Result<String, SyncError> {
            thread::sleep(self.0);
            Ok("Qty,Name\n1,Desk\n".to_string())
        }
    }

    fn app_with(assistant: Option<Arc<dyn AnswerService>>) -> App {
        let fetcher: Arc<dyn SheetFetcher> = Arc::new(FixedSheet("Qty,Name,Place,Owner\n5,Laptop,Almacen,Ana\n"));
        app_with_fetcher(fetcher, assistant)
    }

    fn app_with_fetcher(fetcher: Arc<dyn SheetFetcher>, assistant: Option<Arc<dyn AnswerService>>) -> App {
        let state = InventoryState::load(Box::new(MemoryStore::new()), LINK);
        let scheduler = SyncScheduler::new(fetcher, Duration::from_secs(3600));
        App::new(state, scheduler, &ConfigFile::default(), assistant)
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn tick_until(app: &mut App, done: impl Fn(&App) -> bool) {
        for _ in 0..200 {
            app.tick();
            if done(app) {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached");
    }

    #[test]
    fn search_then_enter_selects_item() {
        let mut app = app_with(None);
        press(&mut app, KeyCode::F(2));
        type_text(&mut app, "r");
        assert!(!app.autocomplete.is_open());
        type_text(&mut app, "out");
        assert!(app.autocomplete.is_open());
        assert_eq!(app.autocomplete.suggestions().len(), 1);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state.selected().unwrap().name, "Router Cisco ISR 4331");
        assert_eq!(app.autocomplete.query(), "Router Cisco ISR 4331");
        assert!(!app.autocomplete.is_open());
    }

    #[test]
    fn leaving_the_search_box_closes_suggestions() {
        let mut app = app_with(None);
        press(&mut app, KeyCode::F(2));
        type_text(&mut app, "la");
        assert!(app.autocomplete.is_open());
        press(&mut app, KeyCode::Tab);
        assert!(!app.autocomplete.is_open());
        assert_eq!(app.query_focus, QueryFocus::Question);
    }

    #[test]
    fn question_without_assistant_reports_it() {
        let mut app = app_with(None);
        press(&mut app, KeyCode::F(2));
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "where are the chairs?");
        press(&mut app, KeyCode::Enter);

        let entries = app.conversation.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[1].role, Role::System);
        assert_eq!(entries[1].text, ASSISTANT_UNAVAILABLE);
        assert!(app.question_input.is_empty());
    }

    #[test]
    fn question_is_answered_on_a_worker() {
        let mut app = app_with(Some(Arc::new(Echo)));
        press(&mut app, KeyCode::F(2));
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "how many?");
        press(&mut app, KeyCode::Enter);
        assert!(app.conversation.is_pending());

        tick_until(&mut app, |app| !app.conversation.is_pending());
        let last = app.conversation.entries().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.text.starts_with("echo: "));
    }

    #[test]
    fn manual_sync_replaces_inventory() {
        let mut app = app_with(None);
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL));
        assert!(app.state.is_syncing());

        tick_until(&mut app, |app| !app.state.is_syncing());
        assert_eq!(app.state.records().len(), 1);
        assert_eq!(app.state.records()[0].name, "Laptop");
        assert_eq!(app.state.status().unwrap().kind, StatusKind::Success);
    }

    #[test]
    fn saving_a_new_link_rearms_polling() {
        let mut app = app_with(None);
        app.activate_link();
        let generation = app.scheduler.generation();

        press(&mut app, KeyCode::F(4));
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        type_text(&mut app, "https://docs.google.com/spreadsheets/d/other");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.state.source_link(), "https://docs.google.com/spreadsheets/d/other");
        assert!(app.scheduler.generation() > generation);
        assert!(app.scheduler.is_armed());
        assert!(app.state.is_syncing());
    }

    #[test]
    fn link_saved_during_a_sync_reports_its_own_result() {
        let mut app = app_with_fetcher(Arc::new(SlowSheet(Duration::from_millis(300))), None);
        app.activate_link();
        app.sync_now();
        assert!(app.state.is_syncing());

        press(&mut app, KeyCode::F(4));
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        type_text(&mut app, "https://example.com/not-a-sheet");
        press(&mut app, KeyCode::Enter);
        assert!(app.state.is_syncing());

        tick_until(&mut app, |app| !app.state.is_syncing());
        thread::sleep(Duration::from_millis(400));
        app.tick();

        assert_eq!(app.state.source_link(), "https://example.com/not-a-sheet");
        let status = app.state.status().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.message, SyncError::InvalidSource.to_string());
        assert!(!app.state.is_syncing());
    }

    #[test]
    fn unchanged_link_keeps_the_poller() {
        let mut app = app_with(None);
        app.activate_link();
        let generation = app.scheduler.generation();
        press(&mut app, KeyCode::F(4));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.scheduler.generation(), generation);
    }

    #[test]
    fn inventory_enter_opens_details() {
        let mut app = app_with(None);
        press(&mut app, KeyCode::F(3));
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state.section(), Section::Query);
        assert_eq!(app.state.selected().unwrap().name, "Ergonomic Chair Pro");
        assert!(!app.autocomplete.is_open());
    }

    #[test]
    fn inventory_selection_is_clamped() {
        let mut app = app_with(None);
        press(&mut app, KeyCode::F(3));
        press(&mut app, KeyCode::PageDown);
        assert_eq!(app.inventory_selection, app.state.records().len() - 1);
        press(&mut app, KeyCode::Char('k'));
        press(&mut app, KeyCode::Home);
        assert_eq!(app.inventory_selection, 0);
    }

    #[test]
    fn digits_switch_sections_outside_text_inputs() {
        let mut app = app_with(None);
        press(&mut app, KeyCode::Char('3'));
        assert_eq!(app.state.section(), Section::Inventory);
        press(&mut app, KeyCode::Char('4'));
        assert_eq!(app.state.section(), Section::Settings);
        press(&mut app, KeyCode::Char('1'));
        assert_eq!(app.state.section(), Section::Settings);
        assert!(app.link_input.ends_with('1'));
    }

    #[test]
    fn config_is_created_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let created = load_config(&path).unwrap();
        assert_eq!(created.search.max_suggestions, 5);
        assert!(path.exists());

        fs::write(&path, "[sync]\ninterval_secs = 30\n\n[search]\nmax_suggestions = 10\n").unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.sync.interval_secs, 30);
        assert_eq!(loaded.sync.request_timeout_secs, 15);
        assert_eq!(loaded.search.max_suggestions, 10);
        assert_eq!(loaded.assistant.inactivity_secs, 60);

        fs::write(&path, "[sync]\ninterval_secs = 0\nrequest_timeout_secs = 0\n").unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.sync.interval_secs, 60);
        assert_eq!(loaded.sync.request_timeout_secs, 15);
    }
}
