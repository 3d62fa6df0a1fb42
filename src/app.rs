use crate::backend::BackendClient;
use crate::config::Config;
use crate::events::{AppEvent, Notice, NoticeLevel};
use crate::store::ConversationStore;
use crate::ui::chat::{get_help_text, ParsedCommand, SlashCommand};
use crate::ui::{ChatHistory, ChatManager, Composer, ComposerResult, PanelAction, SchemaPanel};
use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    Frame, Terminal,
};
use tokio::sync::mpsc;

/// Which pane receives key input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Chat,
    Schema,
}

/// The TUI application: owns all mutable state and the single event loop.
///
/// Backend calls run in spawned tasks and report back as [`AppEvent`]s, so
/// every state mutation happens here on the loop.
pub struct App {
    config: Config,
    client: BackendClient,
    manager: ChatManager,
    composer: Composer,
    schema_panel: SchemaPanel,
    focus: Focus,
    show_schema: bool,
    notice: Option<Notice>,
    confirm_clear: bool,
    should_exit: bool,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: Config, tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        let client = BackendClient::new(config.backend_url.clone());
        let store = ConversationStore::open(config.history_path());
        let manager = ChatManager::new(store);
        let mut composer = Composer::new(
            "Ask for a query, e.g. \"show me all users\"...".to_string(),
        );
        composer.set_focus(true);
        let schema_panel = SchemaPanel::new(
            crate::schema::Schema::new(Vec::new()),
            config.schema_fallback_path(),
        );
        let show_schema = config.ui.show_schema_panel;

        Self {
            config,
            client,
            manager,
            composer,
            schema_panel,
            focus: Focus::Chat,
            show_schema,
            notice: None,
            confirm_clear: false,
            should_exit: false,
            tx,
        }
    }

    /// Run the TUI until the user exits
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<AppEvent>) -> Result<()> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

        self.spawn_schema_fetch();

        let result = self.event_loop(&mut terminal, &mut rx).await;

        disable_raw_mode().ok();
        execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
        terminal.show_cursor().ok();

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
        rx: &mut mpsc::UnboundedReceiver<AppEvent>,
    ) -> Result<()> {
        let mut events = EventStream::new();

        loop {
            terminal.draw(|frame| self.draw(frame))?;

            tokio::select! {
                maybe_event = events.next() => {
                    match maybe_event {
                        Some(Ok(Event::Key(key))) => self.handle_key(key),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!("terminal event error: {e}");
                        }
                        None => break,
                    }
                }
                maybe_app = rx.recv() => {
                    if let Some(event) = maybe_app {
                        self.handle_app_event(event);
                    }
                }
            }

            if self.should_exit {
                break;
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        // Transient notices clear on the next key; sticky ones stay until the
        // condition they report is resolved.
        if self.notice.as_ref().is_some_and(|n| !n.sticky) && !self.confirm_clear {
            self.notice = None;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_exit = true;
            return;
        }

        // A pending clear-history confirmation swallows the next key.
        if self.confirm_clear {
            self.confirm_clear = false;
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                match self.manager.clear() {
                    Ok(()) => self.notice = Some(Notice::info("Chat history cleared")),
                    Err(e) => {
                        tracing::warn!("failed to clear history: {e:#}");
                        self.notice = Some(Notice::error("Could not clear chat history"));
                    }
                }
            } else {
                self.notice = None;
            }
            return;
        }

        // Tab switches panes unless a composer palette or schema edit owns it.
        if key.code == KeyCode::Tab
            && !self.composer.palette_open()
            && !self.schema_panel.is_editing()
        {
            self.toggle_focus();
            return;
        }

        match self.focus {
            Focus::Chat => match self.composer.handle_key(key) {
                ComposerResult::Submitted(content) => self.send_message(&content),
                ComposerResult::Command(command) => self.handle_command(command),
                ComposerResult::None => {}
            },
            Focus::Schema => {
                if key.code == KeyCode::Esc && !self.schema_panel.is_editing() {
                    self.toggle_focus();
                    return;
                }
                match self.schema_panel.handle_key(key) {
                    PanelAction::Save { tables, seq } => self.spawn_schema_save(tables, seq),
                    PanelAction::None => {}
                }
            }
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Chat => {
                self.show_schema = true;
                Focus::Schema
            }
            Focus::Schema => Focus::Chat,
        };
        self.composer.set_focus(self.focus == Focus::Chat);
        self.schema_panel.set_focus(self.focus == Focus::Schema);
    }

    fn send_message(&mut self, content: &str) {
        let Some((id, text)) = self.manager.begin_send(content) else {
            return;
        };
        self.composer.set_locked(true);
        if let Some(notice) = self.manager.take_notice() {
            self.notice = Some(notice);
        }

        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = client.translate(&text).await;
            let _ = tx.send(AppEvent::TranslationFinished { id, outcome });
        });
    }

    fn handle_command(&mut self, command: ParsedCommand) {
        match command.command {
            SlashCommand::Clear => {
                self.confirm_clear = true;
                self.notice = Some(Notice::warning("Clear the chat history? y/N"));
            }
            SlashCommand::Schema => {
                if self.focus != Focus::Schema {
                    self.toggle_focus();
                }
            }
            SlashCommand::Theme => {
                let theme = self.config.toggle_theme().to_string();
                if let Err(e) = self.config.save() {
                    tracing::warn!("failed to persist theme: {e:#}");
                }
                self.notice = Some(Notice::info(format!("Theme set to {theme}")));
            }
            SlashCommand::Help => {
                self.manager.append_assistant(get_help_text());
            }
            SlashCommand::Bye => {
                self.should_exit = true;
            }
        }
    }

    fn spawn_schema_fetch(&self) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let (tables, offline) = client.fetch_schema().await;
            let _ = tx.send(AppEvent::SchemaFetched { tables, offline });
        });
    }

    fn spawn_schema_save(&self, tables: Vec<crate::schema::SchemaTable>, seq: u64) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.save_schema(&tables, seq).await;
            let _ = tx.send(AppEvent::SchemaSaveFinished { seq, result });
        });
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SchemaFetched { tables, offline } => {
                self.schema_panel.set_schema(tables, offline);
                if offline {
                    self.notice =
                        Some(Notice::warning("Backend not reachable. Using local schema.").sticky());
                }
            }
            AppEvent::TranslationFinished { id, outcome } => {
                self.manager.finish_translation(id, outcome);
                self.composer.set_locked(self.manager.is_pending());
                if let Some(notice) = self.manager.take_notice() {
                    self.notice = Some(notice);
                }
            }
            AppEvent::SchemaSaveFinished { seq, result } => {
                if let Some(notice) = self.schema_panel.apply_save_result(seq, result) {
                    self.notice = Some(notice);
                }
            }
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(1)])
            .split(frame.size());

        let panes = if self.show_schema {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(34), Constraint::Min(30)])
                .split(outer[0])
        } else {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(0), Constraint::Min(30)])
                .split(outer[0])
        };

        if self.show_schema {
            frame.render_widget(&self.schema_panel, panes[0]);
        }

        let chat = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(panes[1]);

        frame.render_widget(
            ChatHistory::new(
                self.manager.turns(),
                self.config.ui.max_history,
                self.manager.is_pending(),
            ),
            chat[0],
        );
        frame.render_widget(&self.composer, chat[1]);

        frame.render_widget(self.status_line(), outer[1]);
    }

    fn status_line(&self) -> Line<'static> {
        if let Some(notice) = &self.notice {
            let style = match notice.level {
                NoticeLevel::Info => Style::default().fg(Color::Green),
                NoticeLevel::Warning => Style::default().fg(Color::Yellow),
                NoticeLevel::Error => Style::default().fg(Color::Red),
            };
            return Line::from(vec![Span::styled(notice.message.clone(), style)]);
        }

        Line::from(vec![Span::styled(
            "Tab: schema panel  /: commands  Ctrl+C: quit",
            Style::default().fg(Color::DarkGray),
        )])
    }
}
