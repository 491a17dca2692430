use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::completion::{CompletionError, CompletionProvider, FragmentStream};
use crate::core::providers::ProviderSession;
use crate::utils::url::construct_api_url;

#[derive(Clone, Debug)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send(StreamMessage::End);
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(choice) = response.choices.first() {
                if let Some(content) = &choice.delta.content {
                    if !content.is_empty() {
                        let _ = tx.send(StreamMessage::Chunk(content.clone()));
                    }
                }
            }
            false
        }
        Err(_) => {
            if payload.trim().is_empty() {
                return false;
            }

            let formatted_error = format_api_error(payload);
            let _ = tx.send(StreamMessage::Error(formatted_error));
            let _ = tx.send(StreamMessage::End);
            true
        }
    }
}

fn process_sse_line(line: &str, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx))
        .unwrap_or(false)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub(crate) fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error: <empty response>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value) {
                Some(summary) if !summary.is_empty() => {
                    format!("API Error: {summary}\n{pretty_json}")
                }
                _ => format!("API Error:\n{pretty_json}"),
            };
        }
    }

    format!("API Error: {trimmed}")
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub session: ProviderSession,
    pub model: String,
    pub api_messages: Vec<ChatMessage>,
    pub cancel_token: CancellationToken,
}

/// Runs one HTTP streaming request on the tokio runtime and forwards parsed
/// server-sent events through a channel.
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<StreamMessage>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(self, params: StreamParams) {
        let tx = self.tx;
        tokio::spawn(async move {
            let StreamParams {
                client,
                session,
                model,
                api_messages,
                cancel_token,
            } = params;

            let request = ChatRequest {
                model,
                messages: api_messages,
                stream: true,
                max_tokens: session.max_tokens,
            };

            tokio::select! {
                _ = async {
                    let chat_url = construct_api_url(&session.base_url, "chat/completions");
                    debug!(url = %chat_url, model = %request.model, messages = request.messages.len(), "starting completion stream");
                    let http_request = client
                        .post(chat_url)
                        .header("Content-Type", "application/json");
                    let http_request = crate::utils::auth::add_auth_headers(http_request, &session);

                    match http_request.json(&request).send().await {
                        Ok(response) => {
                            if !response.status().is_success() {
                                let status = response.status();
                                let error_text = response
                                    .text()
                                    .await
                                    .unwrap_or_else(|_| "<no body>".to_string());
                                warn!(%status, "completion request rejected");
                                let _ = tx.send(StreamMessage::Error(format_api_error(&error_text)));
                                let _ = tx.send(StreamMessage::End);
                                return;
                            }

                            let mut stream = response.bytes_stream();
                            let mut buffer: Vec<u8> = Vec::new();

                            while let Some(chunk) = stream.next().await {
                                let chunk_bytes = match chunk {
                                    Ok(bytes) => bytes,
                                    Err(e) => {
                                        let _ = tx.send(StreamMessage::Error(format_api_error(&e.to_string())));
                                        let _ = tx.send(StreamMessage::End);
                                        return;
                                    }
                                };
                                buffer.extend_from_slice(&chunk_bytes);

                                while let Some(newline_pos) = memchr(b'\n', &buffer) {
                                    let should_end = match std::str::from_utf8(&buffer[..newline_pos]) {
                                        Ok(line) => process_sse_line(line.trim(), &tx),
                                        Err(e) => {
                                            warn!("invalid UTF-8 in stream: {e}");
                                            false
                                        }
                                    };
                                    buffer.drain(..=newline_pos);
                                    if should_end {
                                        return;
                                    }
                                }
                            }

                            if let Ok(line) = std::str::from_utf8(&buffer) {
                                if process_sse_line(line.trim(), &tx) {
                                    return;
                                }
                            }
                            let _ = tx.send(StreamMessage::End);
                        }
                        Err(e) => {
                            let _ = tx.send(StreamMessage::Error(format_api_error(&e.to_string())));
                            let _ = tx.send(StreamMessage::End);
                        }
                    }
                } => {}
                _ = cancel_token.cancelled() => {
                    debug!("completion stream cancelled");
                }
            }
        });
    }
}

/// Chat-completion client for OpenAI-compatible endpoints.
pub struct HttpCompletionProvider {
    client: reqwest::Client,
    session: ProviderSession,
}

enum Pump {
    Idle(StreamParams),
    Receiving(mpsc::UnboundedReceiver<StreamMessage>, DropGuard),
    Finished,
}

impl HttpCompletionProvider {
    pub fn new(session: ProviderSession) -> Self {
        Self {
            client: reqwest::Client::new(),
            session,
        }
    }

    pub fn session(&self) -> &ProviderSession {
        &self.session
    }
}

impl CompletionProvider for HttpCompletionProvider {
    fn stream_completion(&self, model: &str, messages: Vec<ChatMessage>) -> FragmentStream {
        let params = StreamParams {
            client: self.client.clone(),
            session: self.session.clone(),
            model: self.session.api_model_name(model).to_string(),
            api_messages: messages,
            cancel_token: CancellationToken::new(),
        };

        // Nothing is sent until the first poll; dropping the stream cancels
        // the request through the guard.
        let stream = futures_util::stream::unfold(Pump::Idle(params), |state| async move {
            let (mut rx, guard) = match state {
                Pump::Idle(params) => {
                    let guard = params.cancel_token.clone().drop_guard();
                    let (service, rx) = ChatStreamService::new();
                    service.spawn_stream(params);
                    (rx, guard)
                }
                Pump::Receiving(rx, guard) => (rx, guard),
                Pump::Finished => return None,
            };

            match rx.recv().await {
                Some(StreamMessage::Chunk(content)) => {
                    Some((Ok(content), Pump::Receiving(rx, guard)))
                }
                Some(StreamMessage::Error(message)) => {
                    Some((Err(CompletionError::new(message)), Pump::Finished))
                }
                Some(StreamMessage::End) | None => None,
            }
        });

        Box::pin(stream)
    }
}
