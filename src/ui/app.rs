//! State of the interactive chat and the transitions driven by keys and
//! stream updates. Nothing here touches the terminal or the network; the
//! event loop turns returned [`Command`]s into spawned streams.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, warn};

use crate::api::ChatMessage;
use crate::core::message::{Chat, Message, MessageRole, DEFAULT_CHAT_TITLE};
use crate::utils::input::flatten_paste;
use crate::utils::logging::LoggingState;

pub const TITLE_PROMPT: &str = "Summarize in one short sentence the following message:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTarget {
    Reply,
    Title,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    Failed(String),
    Finished,
}

/// A stream event tagged with the id of the stream that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUpdate {
    pub id: u64,
    pub target: StreamTarget,
    pub event: StreamEvent,
}

/// Work the event loop must perform on behalf of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start {
        id: u64,
        target: StreamTarget,
        messages: Vec<ChatMessage>,
    },
    Abort(StreamTarget),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollState {
    pub offset: u16,
    /// Stick to the bottom while new text arrives.
    pub follow: bool,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            offset: 0,
            follow: true,
        }
    }
}

impl ScrollState {
    pub fn up(&mut self, rows: u16) {
        self.offset = self.offset.saturating_sub(rows);
        self.follow = false;
    }

    pub fn down(&mut self, rows: u16, max_offset: u16) {
        self.offset = self.offset.saturating_add(rows).min(max_offset);
        self.follow = self.offset >= max_offset;
    }

    /// Clamps to the content and applies follow mode.
    pub fn settle(&mut self, max_offset: u16) {
        if self.follow || self.offset > max_offset {
            self.offset = max_offset;
        }
    }
}

pub struct ChatApp {
    pub chat: Chat,
    pub model: String,
    pub input: String,
    /// Assistant text received so far for the in-flight reply.
    pub pending: Option<String>,
    /// Last error or notice, shown under the transcript.
    pub status: Option<String>,
    pub scroll: ScrollState,
    pub exit_requested: bool,
    reply_stream: Option<u64>,
    title_stream: Option<u64>,
    title_requested: bool,
    next_stream_id: u64,
    logging: LoggingState,
}

impl ChatApp {
    pub fn new(model: impl Into<String>, logging: LoggingState) -> Self {
        Self {
            chat: Chat::new(),
            model: model.into(),
            input: String::new(),
            pending: None,
            status: None,
            scroll: ScrollState::default(),
            exit_requested: false,
            reply_stream: None,
            title_stream: None,
            title_requested: false,
            next_stream_id: 0,
            logging,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.reply_stream.is_some()
    }

    pub fn logging(&self) -> &LoggingState {
        &self.logging
    }

    fn allocate_stream_id(&mut self) -> u64 {
        self.next_stream_id += 1;
        self.next_stream_id
    }

    fn commit(&mut self, message: Message) {
        if let Err(err) = self.logging.log_message(&message) {
            warn!(error = %err, "Failed to write transcript");
        }
        self.chat.add_message(message);
    }

    /// Sends the input line. Returns nothing while a reply is streaming or
    /// when the line is blank.
    pub fn submit(&mut self) -> Vec<Command> {
        if self.is_streaming() || self.input.trim().is_empty() {
            return Vec::new();
        }

        let text = std::mem::take(&mut self.input).trim().to_string();
        self.status = None;
        self.commit(Message::user(text.clone()));

        let mut commands = Vec::new();
        let reply_id = self.allocate_stream_id();
        self.reply_stream = Some(reply_id);
        self.pending = Some(String::new());
        self.scroll.follow = true;
        commands.push(Command::Start {
            id: reply_id,
            target: StreamTarget::Reply,
            messages: self.chat.to_wire(),
        });

        if !self.title_requested {
            self.title_requested = true;
            let title_id = self.allocate_stream_id();
            self.title_stream = Some(title_id);
            commands.push(Command::Start {
                id: title_id,
                target: StreamTarget::Title,
                messages: vec![Message::user(format!("{TITLE_PROMPT}\n\n{text}")).to_wire()],
            });
        }
        commands
    }

    /// Applies a stream update; updates from superseded streams are dropped.
    pub fn apply(&mut self, update: StreamUpdate) {
        match update.target {
            StreamTarget::Reply => {
                if self.reply_stream != Some(update.id) {
                    debug!(id = update.id, "Ignoring stale reply update");
                    return;
                }
                self.apply_reply(update.event);
            }
            StreamTarget::Title => {
                if self.title_stream != Some(update.id) {
                    return;
                }
                self.apply_title(update.event);
            }
        }
    }

    fn apply_reply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Fragment(fragment) => {
                self.pending.get_or_insert_with(String::new).push_str(&fragment);
            }
            StreamEvent::Failed(error) => {
                self.reply_stream = None;
                self.pending = None;
                self.status = Some(format!("❌ {error}"));
            }
            StreamEvent::Finished => {
                self.reply_stream = None;
                let text = self.pending.take().unwrap_or_default();
                self.commit(Message::assistant(text.trim()));
            }
        }
    }

    fn apply_title(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Fragment(fragment) => {
                if self.chat.title == DEFAULT_CHAT_TITLE {
                    self.chat.set_title("");
                }
                self.chat.append_title(&fragment);
            }
            StreamEvent::Failed(error) => {
                debug!(%error, "Title generation failed");
                self.title_stream = None;
                if self.chat.title.trim().is_empty() {
                    self.chat.set_title(DEFAULT_CHAT_TITLE);
                }
            }
            StreamEvent::Finished => {
                self.title_stream = None;
                let title = self.chat.title.trim().to_string();
                if title.is_empty() {
                    self.chat.set_title(DEFAULT_CHAT_TITLE);
                } else {
                    self.chat.set_title(title);
                }
            }
        }
    }

    /// Stops the in-flight reply. Text received so far is kept as the
    /// assistant message.
    pub fn cancel_reply(&mut self) -> Vec<Command> {
        if self.reply_stream.take().is_none() {
            return Vec::new();
        }
        let partial = self.pending.take().unwrap_or_default();
        if !partial.trim().is_empty() {
            self.commit(Message::assistant(partial.trim()));
        }
        self.status = Some("Response stopped".to_string());
        vec![Command::Abort(StreamTarget::Reply)]
    }

    /// Drops the conversation and any streams feeding it.
    pub fn new_chat(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.reply_stream.take().is_some() {
            commands.push(Command::Abort(StreamTarget::Reply));
        }
        if self.title_stream.take().is_some() {
            commands.push(Command::Abort(StreamTarget::Title));
        }
        self.chat = Chat::new();
        self.pending = None;
        self.status = None;
        self.title_requested = false;
        self.scroll = ScrollState::default();
        if let Err(err) = self.logging.start_session("New chat") {
            warn!(error = %err, "Failed to write transcript header");
        }
        commands
    }

    pub fn paste(&mut self, text: &str) {
        self.input.push_str(&flatten_paste(text));
    }

    /// Handles a key press. `page` is the transcript height in rows and
    /// `max_offset` the largest useful scroll offset.
    pub fn handle_key(&mut self, key: KeyEvent, page: u16, max_offset: u16) -> Vec<Command> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
                self.exit_requested = true;
                let mut commands = Vec::new();
                if self.reply_stream.take().is_some() {
                    commands.push(Command::Abort(StreamTarget::Reply));
                }
                if self.title_stream.take().is_some() {
                    commands.push(Command::Abort(StreamTarget::Title));
                }
                commands
            }
            KeyCode::Esc => self.cancel_reply(),
            KeyCode::F(2) => self.new_chat(),
            KeyCode::Enter => self.submit(),
            KeyCode::Char(c) if !ctrl => {
                self.input.push(c);
                Vec::new()
            }
            KeyCode::Backspace => {
                self.input.pop();
                Vec::new()
            }
            KeyCode::Up => {
                self.scroll.up(1);
                Vec::new()
            }
            KeyCode::Down => {
                self.scroll.down(1, max_offset);
                Vec::new()
            }
            KeyCode::PageUp => {
                self.scroll.up(page.max(1));
                Vec::new()
            }
            KeyCode::PageDown => {
                self.scroll.down(page.max(1), max_offset);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Messages to display, with the in-flight reply as a trailing entry.
    pub fn transcript(&self) -> Vec<(MessageRole, &str)> {
        let mut entries: Vec<(MessageRole, &str)> = self
            .chat
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        if let Some(pending) = &self.pending {
            entries.push((MessageRole::Assistant, pending.as_str()));
        }
        entries
    }
}
