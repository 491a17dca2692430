//! `juggler complete <file>`: continue a file in place.

use std::error::Error;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

use crate::core::chat_stream::HttpCompletionProvider;
use crate::core::completion::{collect_fragments, CompletionError, CompletionProvider};
use crate::core::config::Config;
use crate::core::message::{Chat, Message};

use super::resolve_session_or_exit;

pub const COMPLETE_INSTRUCTIONS: &str = "You are a specialist in programming, your job is to \
expand the provided content. No additional content or markdown should be provided, only \
respond with the incremental content.

# Instructions

- Do not add markdown or triple quotes
- Only return the content that should be appended to file";

/// The fixed instruction followed by the file contents as the user turn.
pub fn completion_chat(content: &str) -> Chat {
    let mut chat = Chat::new();
    chat.add_message(Message::system(COMPLETE_INSTRUCTIONS));
    chat.add_message(Message::user(content));
    chat
}

pub async fn run_complete(config: &Config, model: &str, path: &Path) -> Result<(), Box<dyn Error>> {
    let session = resolve_session_or_exit(config, model);
    let provider = HttpCompletionProvider::new(session);
    let mut stdout = io::stdout();
    complete_file(&provider, model, path, &mut stdout).await?;
    writeln!(stdout)?;
    Ok(())
}

/// Prints the file, then streams the continuation to `out` and appends it to
/// the file as it arrives. Returns the appended text.
pub async fn complete_file<W: Write>(
    provider: &dyn CompletionProvider,
    model: &str,
    path: &Path,
    out: &mut W,
) -> Result<String, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)?;
    write!(out, "{content}")?;
    out.flush()?;

    let mut file = OpenOptions::new().append(true).open(path)?;
    info!(path = %path.display(), model, "Completing file");

    let stream = provider.stream_completion(model, completion_chat(&content).to_wire());
    let appended = collect_fragments(stream, |fragment| {
        let write = |w: &mut dyn Write| -> io::Result<()> {
            w.write_all(fragment.as_bytes())?;
            w.flush()
        };
        write(&mut *out)
            .and_then(|_| write(&mut file))
            .map_err(|err| CompletionError::new(format!("failed to write continuation: {err}")))
    })
    .await?;

    Ok(appended)
}
