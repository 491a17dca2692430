//! Interactive shell assistant: the model proposes `sh` blocks, the operator
//! confirms, and command output flows back into the conversation.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::process::Stdio;
use std::sync::LazyLock;

use minijinja::Environment;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::completion::{echo_fragments, CompletionError, CompletionProvider, EchoError};
use crate::core::message::{Chat, Message};
use crate::template::TemplateLoader;
use crate::utils::logging::LoggingState;

const SYSTEM_TEMPLATE_NAME: &str = "sh_system";
const BUILTIN_SYSTEM_TEMPLATE: &str = include_str!("../../prompts/sh_system.j2");
const MACHINE_INFO_COMMAND: &str = "uname -a && $SHELL --version";

static SH_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```sh(?:[ \t]*\n|[ \t]+)([\s\S]*?)```").expect("sh block pattern is valid")
});

/// The first fenced `sh` block of a reply, trimmed. Empty blocks are ignored.
pub fn extract_sh_block(reply: &str) -> Option<String> {
    SH_BLOCK_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|block| block.as_str().trim().to_string())
        .filter(|block| !block.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Runs `command` through `sh -c`, capturing both output streams.
pub async fn run_command(command: &str) -> io::Result<CommandOutput> {
    debug!(command, "Running shell command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .output()
        .await?;
    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
    })
}

#[derive(Debug)]
pub enum ShellError {
    Io(io::Error),
    Completion(CompletionError),
    Render(minijinja::Error),
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::Io(err) => write!(f, "I/O error: {err}"),
            ShellError::Completion(err) => write!(f, "completion failed: {err}"),
            ShellError::Render(err) => write!(f, "failed to render shell system prompt: {err}"),
        }
    }
}

impl std::error::Error for ShellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShellError::Io(err) => Some(err),
            ShellError::Completion(err) => Some(err),
            ShellError::Render(err) => Some(err),
        }
    }
}

impl From<io::Error> for ShellError {
    fn from(err: io::Error) -> Self {
        ShellError::Io(err)
    }
}

impl From<CompletionError> for ShellError {
    fn from(err: CompletionError) -> Self {
        ShellError::Completion(err)
    }
}

impl From<EchoError> for ShellError {
    fn from(err: EchoError) -> Self {
        match err {
            EchoError::Stream(err) => ShellError::Completion(err),
            EchoError::Write(err) => ShellError::Io(err),
        }
    }
}

impl From<minijinja::Error> for ShellError {
    fn from(err: minijinja::Error) -> Self {
        ShellError::Render(err)
    }
}

/// Renders the shell system prompt with a description of the machine. A
/// `sh_system.j2` on the search path overrides the built-in one.
pub fn render_system_prompt(loader: &TemplateLoader, machine: &str) -> Result<String, ShellError> {
    let source = match loader.find(SYSTEM_TEMPLATE_NAME) {
        Some(path) => std::fs::read_to_string(path)?,
        None => BUILTIN_SYSTEM_TEMPLATE.to_string(),
    };
    let env = Environment::new();
    let rendered = env
        .template_from_str(&source)?
        .render(minijinja::context! { shell => machine.trim() })?;
    Ok(rendered.trim().to_string())
}

pub struct ShellAgent<'a, R, W> {
    model: String,
    provider: &'a dyn CompletionProvider,
    chat: Chat,
    input: R,
    out: W,
    logging: LoggingState,
}

impl<'a, R: BufRead, W: Write> ShellAgent<'a, R, W> {
    pub fn new(
        model: impl Into<String>,
        provider: &'a dyn CompletionProvider,
        system_prompt: String,
        input: R,
        out: W,
        logging: LoggingState,
    ) -> Self {
        let mut chat = Chat::new();
        chat.add_message(Message::system(system_prompt));
        Self {
            model: model.into(),
            provider,
            chat,
            input,
            out,
            logging,
        }
    }

    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    /// Reads requests until empty input or end-of-file.
    pub async fn run(&mut self) -> Result<(), ShellError> {
        info!(model = %self.model, "Shell session started");
        while let Some(line) = self.prompt("> ")? {
            if line.is_empty() {
                break;
            }
            self.turn(&line).await?;
        }
        Ok(())
    }

    /// One request: stream the reply, then offer to run a proposed command.
    pub async fn turn(&mut self, request: &str) -> Result<(), ShellError> {
        self.commit(Message::user(request));

        let stream = self
            .provider
            .stream_completion(&self.model, self.chat.to_wire());
        let reply = echo_fragments(stream, &mut self.out).await?;
        self.commit(Message::assistant(reply.trim()));

        let Some(command) = extract_sh_block(&reply) else {
            return Ok(());
        };
        if !self.confirm()? {
            debug!("Operator declined command");
            return Ok(());
        }

        let output = run_command(&command).await?;
        write!(self.out, "{}", output.stdout)?;
        if !output.stderr.is_empty() {
            write!(self.out, "{}", output.stderr)?;
        }
        if !output.success {
            writeln!(self.out, "⚠️  command exited with a failure status")?;
        }
        self.commit(Message::system(output.stdout.trim()));
        Ok(())
    }

    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.out, "{label}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn confirm(&mut self) -> io::Result<bool> {
        let answer = self.prompt("run? [Y/n] ")?.unwrap_or_else(|| "n".to_string());
        Ok(matches!(answer.to_lowercase().as_str(), "" | "y" | "yes"))
    }

    fn commit(&mut self, message: Message) {
        if let Err(err) = self.logging.log_message(&message) {
            warn!(error = %err, "Failed to write transcript");
        }
        self.chat.add_message(message);
    }
}

/// Collects the machine description used by the system prompt.
pub async fn machine_info() -> String {
    match run_command(MACHINE_INFO_COMMAND).await {
        Ok(output) => output.stdout,
        Err(err) => {
            debug!(error = %err, "Could not describe machine");
            String::new()
        }
    }
}
