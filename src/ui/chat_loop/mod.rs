//! Interactive chat event loop.
//!
//! Terminal events are read on a background task; completion streams run on
//! their own tasks and report back tagged with the stream id they were started
//! with, so a cancelled or superseded stream can never leak into the chat.

mod lifecycle;

use std::{error::Error, sync::Arc, time::Duration};

use futures_util::StreamExt;
use ratatui::crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use self::lifecycle::{restore_terminal, setup_terminal, ChatTerminal};
use crate::api::ChatMessage;
use crate::core::chat_stream::HttpCompletionProvider;
use crate::core::completion::CompletionProvider;
use crate::core::providers::ProviderSession;
use crate::ui::app::{ChatApp, Command, StreamEvent, StreamTarget, StreamUpdate};
use crate::ui::render::{self, Viewport};
use crate::utils::logging::LoggingState;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Handles of the streams currently feeding the app.
#[derive(Default)]
struct StreamTasks {
    reply: Option<JoinHandle<()>>,
    title: Option<JoinHandle<()>>,
}

impl StreamTasks {
    fn slot(&mut self, target: StreamTarget) -> &mut Option<JoinHandle<()>> {
        match target {
            StreamTarget::Reply => &mut self.reply,
            StreamTarget::Title => &mut self.title,
        }
    }

    /// Aborting the task drops its stream, which cancels the HTTP request.
    fn abort(&mut self, target: StreamTarget) {
        if let Some(handle) = self.slot(target).take() {
            handle.abort();
        }
    }

    fn abort_all(&mut self) {
        self.abort(StreamTarget::Reply);
        self.abort(StreamTarget::Title);
    }
}

/// Forwards every fragment of one completion to `tx`, ending with either
/// `Finished` or `Failed`.
fn spawn_stream(
    provider: Arc<dyn CompletionProvider>,
    model: String,
    id: u64,
    target: StreamTarget,
    messages: Vec<ChatMessage>,
    tx: mpsc::UnboundedSender<StreamUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let send = |event| tx.send(StreamUpdate { id, target, event }).is_ok();
        let mut stream = provider.stream_completion(&model, messages);
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => {
                    if !send(StreamEvent::Fragment(fragment)) {
                        return;
                    }
                }
                Err(err) => {
                    send(StreamEvent::Failed(err.to_string()));
                    return;
                }
            }
        }
        send(StreamEvent::Finished);
    })
}

fn execute_commands(
    commands: Vec<Command>,
    tasks: &mut StreamTasks,
    provider: &Arc<dyn CompletionProvider>,
    model: &str,
    tx: &mpsc::UnboundedSender<StreamUpdate>,
) {
    for command in commands {
        match command {
            Command::Start {
                id,
                target,
                messages,
            } => {
                debug!(id, ?target, messages = messages.len(), "Starting stream");
                tasks.abort(target);
                *tasks.slot(target) = Some(spawn_stream(
                    Arc::clone(provider),
                    model.to_string(),
                    id,
                    target,
                    messages,
                    tx.clone(),
                ));
            }
            Command::Abort(target) => {
                debug!(?target, "Aborting stream");
                tasks.abort(target);
            }
        }
    }
}

pub async fn run_chat(
    model: String,
    session: ProviderSession,
    logging: LoggingState,
) -> Result<(), Box<dyn Error>> {
    info!(provider = %session.provider_display_name, %model, "Starting chat");
    let provider: Arc<dyn CompletionProvider> = Arc::new(HttpCompletionProvider::new(session));

    if let Err(err) = logging.start_session("New chat") {
        tracing::warn!(error = %err, "Failed to write transcript header");
    }
    let mut app = ChatApp::new(model, logging);

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut app, provider).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut ChatTerminal,
    app: &mut ChatApp,
    provider: Arc<dyn CompletionProvider>,
) -> Result<(), Box<dyn Error>> {
    let (stream_tx, mut stream_rx) = mpsc::unbounded_channel::<StreamUpdate>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let event_reader = tokio::spawn(async move {
        loop {
            if let Ok(true) = event::poll(POLL_INTERVAL) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(_) => continue,
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    });

    let mut tasks = StreamTasks::default();
    let mut viewport = Viewport::default();
    let model = app.model.clone();

    let result = loop {
        if let Err(err) = terminal.draw(|f| viewport = render::draw(f, app)) {
            break Err(err.into());
        }

        let commands = tokio::select! {
            Some(ev) = event_rx.recv() => match ev {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    app.handle_key(key, viewport.height, viewport.max_offset)
                }
                Event::Paste(text) => {
                    app.paste(&text);
                    Vec::new()
                }
                _ => Vec::new(),
            },
            Some(update) = stream_rx.recv() => {
                app.apply(update);
                // Coalesce whatever else arrived before the next frame.
                while let Ok(update) = stream_rx.try_recv() {
                    app.apply(update);
                }
                Vec::new()
            },
            else => break Ok(()),
        };

        execute_commands(commands, &mut tasks, &provider, &model, &stream_tx);
        if app.exit_requested {
            break Ok(());
        }
    };

    tasks.abort_all();
    event_reader.abort();
    result
}
