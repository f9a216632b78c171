use anyhow::Result;
use ratatui::layout::Rect;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::client::{HttpTransport, PromptTransport};
use crate::config::Config;
use crate::controller::{ChatController, Exchange};
use crate::exchange::{run_exchange, ExchangeEvent};
use crate::tui::{self, AppEvent, EventHandler, Tui};
use crate::{handler, ui};

pub struct App {
    pub should_quit: bool,
    pub controller: ChatController,
    pub transport: Arc<dyn PromptTransport>,
    events: mpsc::UnboundedSender<AppEvent>,
    pub server_label: String,

    // Chat scroll state
    pub chat_scroll: u16,
    /// Pinned to the newest output; cleared when the user scrolls up
    pub follow: bool,
    pub max_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Panel area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8,
}

impl App {
    pub fn new(
        transport: Arc<dyn PromptTransport>,
        events: mpsc::UnboundedSender<AppEvent>,
        use_rag: bool,
        server_label: impl Into<String>,
    ) -> Self {
        Self {
            should_quit: false,
            controller: ChatController::new(use_rag),
            transport,
            events,
            server_label: server_label.into(),
            chat_scroll: 0,
            follow: true,
            max_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            animation_frame: 0,
        }
    }

    /// Handle Enter: submit the input and start the exchange in the background.
    pub fn submit(&mut self) {
        if let Some(exchange) = self.controller.submit() {
            self.sync_scroll();
            self.spawn_exchange(exchange);
        }
    }

    fn spawn_exchange(&self, exchange: Exchange) {
        let transport = self.transport.clone();
        let tx = self.events.clone();
        tokio::spawn(run_exchange(transport, exchange.id, exchange.request, tx));
    }

    pub fn apply_exchange_event(&mut self, event: ExchangeEvent) {
        self.controller.apply(event);
        self.sync_scroll();
    }

    /// Re-pin the chat to the bottom whenever something was added or grew.
    fn sync_scroll(&mut self) {
        let changes = self.controller.conversation_mut().drain_changes();
        if changes.iter().any(|c| c.wants_scroll_to_bottom()) {
            self.follow = true;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow = false;
        self.chat_scroll = self.chat_scroll.min(self.max_scroll).saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
        if self.chat_scroll >= self.max_scroll {
            self.chat_scroll = self.max_scroll;
            self.follow = true;
        }
    }

    pub fn page_size(&self) -> u16 {
        if self.chat_height > 0 {
            (self.chat_height / 2).max(1)
        } else {
            10
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.controller.in_flight() > 0 {
            self.animation_frame = (self.animation_frame + 1) % 4;
        }
    }
}

/// Run the interactive chat terminal until the user quits.
pub async fn run(config: &Config) -> Result<()> {
    let transport: Arc<dyn PromptTransport> = Arc::new(HttpTransport::new(&config.server_url)?);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(
        transport,
        events.sender(),
        config.use_rag,
        config.server_url.clone(),
    );
    info!(server = %config.server_url, use_rag = config.use_rag, "Chat terminal started");

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    info!("Chat terminal closed");
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
