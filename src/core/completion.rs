//! Streaming completion contract shared by every surface.
//!
//! A completion is a lazy, finite, non-restartable stream of text fragments.
//! `Some(Ok(_))` delivers a fragment, `Some(Err(_))` is terminal, and `None`
//! signals that the stream ended normally. Callers decide whether to await
//! fragments cooperatively (the chat UI does so from a spawned task) or to
//! pump them to completion on the current thread (the template runner).

use std::fmt;
use std::io::{self, Write};
use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use crate::api::ChatMessage;

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Failure reported by the completion collaborator, either while connecting
/// or in the middle of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionError {
    message: String,
}

impl CompletionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CompletionError {}

pub trait CompletionProvider: Send + Sync {
    fn stream_completion(&self, model: &str, messages: Vec<ChatMessage>) -> FragmentStream;
}

/// Drains a fragment stream, handing every fragment to `on_fragment` before
/// it is appended to the returned buffer.
///
/// Nothing is returned on error: a partially streamed reply is never treated
/// as a finished message.
pub async fn collect_fragments<F>(
    mut stream: FragmentStream,
    mut on_fragment: F,
) -> Result<String, CompletionError>
where
    F: FnMut(&str) -> Result<(), CompletionError>,
{
    let mut buffer = String::new();
    while let Some(item) = stream.next().await {
        let fragment = item?;
        on_fragment(&fragment)?;
        buffer.push_str(&fragment);
    }
    Ok(buffer)
}

/// Why echoing a stream stopped: the stream failed or the writer did.
#[derive(Debug)]
pub enum EchoError {
    Stream(CompletionError),
    Write(io::Error),
}

impl fmt::Display for EchoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EchoError::Stream(err) => write!(f, "{err}"),
            EchoError::Write(err) => write!(f, "failed to write output: {err}"),
        }
    }
}

impl std::error::Error for EchoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EchoError::Stream(err) => Some(err),
            EchoError::Write(err) => Some(err),
        }
    }
}

/// Drains `stream` into a buffer while writing and flushing every fragment
/// to `out`, then ends the output line.
pub async fn echo_fragments<W>(stream: FragmentStream, out: &mut W) -> Result<String, EchoError>
where
    W: Write + ?Sized,
{
    let mut write_error = None;
    let collected = collect_fragments(stream, |fragment| {
        out.write_all(fragment.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|err| {
                let message = err.to_string();
                write_error = Some(err);
                CompletionError::new(message)
            })
    })
    .await;

    if let Some(err) = write_error {
        return Err(EchoError::Write(err));
    }
    let text = collected.map_err(EchoError::Stream)?;
    writeln!(out).map_err(EchoError::Write)?;
    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedProvider, ScriptedReply};
    use super::*;

    #[tokio::test]
    async fn collect_fragments_concatenates_in_order() {
        let provider = ScriptedProvider::new(vec![ScriptedReply::ok(&["Hel", "lo"])]);
        let mut seen = Vec::new();
        let text = collect_fragments(provider.stream_completion("m", Vec::new()), |f| {
            seen.push(f.to_string());
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(text, "Hello");
        assert_eq!(seen, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn collect_fragments_surfaces_mid_stream_errors() {
        let provider =
            ScriptedProvider::new(vec![ScriptedReply::failing_after(&["Hel"], "boom")]);
        let mut seen = 0;
        let err = collect_fragments(provider.stream_completion("m", Vec::new()), |_| {
            seen += 1;
            Ok(())
        })
        .await
        .unwrap_err();

        assert_eq!(err.message(), "boom");
        assert_eq!(seen, 1);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn echo_fragments_writes_each_fragment_and_a_newline() {
        let provider = ScriptedProvider::new(vec![ScriptedReply::ok(&["a", "b"])]);
        let mut out = Vec::new();
        let text = echo_fragments(provider.stream_completion("m", Vec::new()), &mut out)
            .await
            .unwrap();

        assert_eq!(text, "ab");
        assert_eq!(out, b"ab\n");
    }

    #[tokio::test]
    async fn echo_fragments_keeps_stream_and_writer_failures_apart() {
        let provider = ScriptedProvider::new(vec![
            ScriptedReply::failing_after(&["a"], "boom"),
            ScriptedReply::ok(&["a"]),
        ]);

        let mut out = Vec::new();
        let err = echo_fragments(provider.stream_completion("m", Vec::new()), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, EchoError::Stream(ref e) if e.message() == "boom"));
        assert_eq!(out, b"a");

        let err = echo_fragments(provider.stream_completion("m", Vec::new()), &mut BrokenPipe)
            .await
            .unwrap_err();
        assert!(matches!(err, EchoError::Write(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
