//! Chat client core: local history, slash-command dispatch and the calls to
//! the server that back them. Rendering and audio/visual effects are left to
//! the front end through [`Effects`].

use std::time::Duration;

use tokio::sync::mpsc;

pub mod api;
pub mod command;
pub mod effects;
pub mod session;
pub mod terminal;

pub use api::{Backend, HttpBackend};
pub use command::Command;
pub use effects::{Effect, Effects, LogEffects, VisualEffect};
pub use session::{ClientSession, Mode};

use crate::gateway::Content;
use crate::routes::chat::model::{ChatMessage, NewMessage, Sender};
use command::{HELP, format_duration};
use terminal::ShellOutput;

/// Messages sent to the model as conversational context.
pub const CONTEXT_WINDOW: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("The server's database is unavailable, try again shortly")]
    Unavailable,
    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent {
    pub duration: Duration,
}

pub struct ChatClient<B, E> {
    backend: B,
    effects: E,
    session: ClientSession,
    messages: Vec<ChatMessage>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: Option<mpsc::UnboundedReceiver<TimerEvent>>,
    clears: u64,
}

impl<B: Backend, E: Effects> ChatClient<B, E> {
    pub fn new(backend: B, effects: E) -> Self {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            effects,
            session: ClientSession::default(),
            messages: Vec::new(),
            timer_tx,
            timer_rx: Some(timer_rx),
            clears: 0,
        }
    }

    /// Hands out the receiver for expired timers; feed each event back through
    /// [`ChatClient::timer_fired`]. Only the first call returns `Some`.
    pub fn take_timer_events(&mut self) -> Option<mpsc::UnboundedReceiver<TimerEvent>> {
        self.timer_rx.take()
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), ClientError> {
        self.backend.register(username, password).await
    }

    /// Signs in and replaces the local list with the stored history.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        let login = self.backend.login(username, password).await?;
        let history = self.backend.history(&login.token).await?;

        tracing::info!("Signed in as {} with {} stored messages", login.username, history.len());
        self.session.sign_in(login.username, login.token);
        self.messages = history;
        Ok(())
    }

    pub fn logout(&mut self) {
        self.session.sign_out();
        self.messages.clear();
    }

    /// Handles one line of user input and returns the messages it appended.
    pub async fn send(&mut self, input: &str) -> Vec<ChatMessage> {
        let input = input.trim();
        if input.is_empty() {
            return Vec::new();
        }

        let start = self.messages.len();
        let clears = self.clears;
        self.push(ChatMessage::new(Sender::User, input)).await;

        match Command::parse(input) {
            Some(command) => self.run_command(command).await,
            None if self.session.modes.terminal => self.run_shell(input),
            None => self.ask_model().await,
        }

        // after a clear everything on screen is new
        let start = if self.clears == clears { start } else { 0 };
        self.messages[start..].to_vec()
    }

    pub async fn timer_fired(&mut self, event: TimerEvent) -> ChatMessage {
        let text = format!("Time's up! Your {} timer is done.", format_duration(event.duration));
        self.reply(text).await
    }

    async fn run_command(&mut self, command: Command) {
        match command {
            Command::Clear => {
                self.clear_local();
                let result = match self.session.token.as_deref() {
                    Some(token) => self.backend.clear(token).await,
                    None => Ok(()),
                };
                if let Err(e) = result {
                    tracing::warn!("Failed to clear server history: {}", e);
                    self.reply(format!("Couldn't clear saved history: {}", e)).await;
                    return;
                }
                self.notice("Chat cleared.");
            }
            Command::Theme => {
                let theme = self.session.randomize_theme().to_string();
                self.effects
                    .apply(Effect::Visual(VisualEffect::Theme(theme.clone())));
                self.notice(format!("Theme switched to {}.", theme));
            }
            Command::Timer(duration) => {
                let tx = self.timer_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = tx.send(TimerEvent { duration });
                });
                self.notice(format!("Timer set for {}.", format_duration(duration)));
            }
            Command::Toggle(mode) => self.toggle(mode),
            Command::Image(prompt) => self.ask_image(&prompt).await,
            Command::Help => self.notice(HELP),
            Command::Invalid(message) => {
                self.reply(message).await;
            }
        }
    }

    fn toggle(&mut self, mode: Mode) {
        let on = self.session.toggle(mode);
        match mode {
            Mode::Matrix => self.effects.apply(Effect::Visual(VisualEffect::Matrix(on))),
            Mode::Glitch => self.effects.apply(Effect::Visual(VisualEffect::Glitch(on))),
            Mode::Convo if on => self.effects.apply(Effect::SpeechInput),
            Mode::Convo | Mode::Terminal => {}
        }
        let state = if on { "on" } else { "off" };
        self.notice(format!("{} mode {}.", mode.label(), state));
    }

    fn run_shell(&mut self, line: &str) {
        match terminal::respond(line, &self.session) {
            ShellOutput::Text(text) => self.notice(text),
            ShellOutput::Clear => self.clear_local(),
            ShellOutput::Exit => self.toggle(Mode::Terminal),
        }
    }

    async fn ask_model(&mut self) {
        let contents = self.context();
        let result = self
            .backend
            .generate_text(self.session.token.as_deref(), &contents)
            .await;
        match result {
            Ok(text) => {
                self.reply(text).await;
            }
            Err(e) => {
                tracing::warn!("Text generation failed: {}", e);
                self.reply(format!("Sorry, I couldn't come up with a reply: {}", e))
                    .await;
            }
        }
    }

    async fn ask_image(&mut self, prompt: &str) {
        let result = self
            .backend
            .generate_image(self.session.token.as_deref(), prompt)
            .await;
        match result {
            Ok(base64) => {
                let message =
                    ChatMessage::image(Sender::Assistant, format!("data:image/png;base64,{}", base64));
                self.push(message).await;
            }
            Err(e) => {
                tracing::warn!("Image generation failed: {}", e);
                self.reply(format!("Sorry, I couldn't draw that: {}", e)).await;
            }
        }
    }

    /// The last few text turns, oldest first, in the provider's shape.
    fn context(&self) -> Vec<Content> {
        let mut turns: Vec<Content> = self
            .messages
            .iter()
            .rev()
            .filter(|m| !m.is_image && m.sender != Sender::System)
            .take(CONTEXT_WINDOW)
            .map(|m| {
                let role = if m.sender == Sender::User { "user" } else { "model" };
                Content::text(role, m.text.clone())
            })
            .collect();
        turns.reverse();
        turns
    }

    async fn reply(&mut self, text: impl Into<String>) -> ChatMessage {
        let message = ChatMessage::new(Sender::Assistant, text);
        if self.session.modes.convo {
            self.effects.apply(Effect::SpeechOutput(message.text.clone()));
            self.effects.apply(Effect::SpeechInput);
        }
        self.push(message.clone()).await;
        message
    }

    fn clear_local(&mut self) {
        self.messages.clear();
        self.clears += 1;
    }

    fn notice(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::new(Sender::System, text));
    }

    /// Appends locally, then persists anything that is not a system notice.
    async fn push(&mut self, message: ChatMessage) {
        self.messages.push(message.clone());
        if message.sender == Sender::System {
            return;
        }
        let Some(token) = self.session.token.as_deref() else {
            return;
        };

        let new = NewMessage {
            sender: message.sender,
            text: message.text,
            is_image: message.is_image,
        };
        if let Err(e) = self.backend.save(token, &new).await {
            tracing::warn!("Failed to persist message: {}", e);
        }
    }
}
