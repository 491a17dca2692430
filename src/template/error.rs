use std::fmt;
use std::io;

use crate::core::completion::{CompletionError, EchoError};
use crate::core::message::Chat;

use super::variables::VariablePromptError;

/// What went wrong while a section was being executed.
#[derive(Debug)]
pub enum TemplateRunErrorKind {
    VariablePrompt(VariablePromptError),
    CompletionStream(CompletionError),
    Render(minijinja::Error),
    Output(io::Error),
}

impl fmt::Display for TemplateRunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateRunErrorKind::VariablePrompt(err) => write!(f, "{err}"),
            TemplateRunErrorKind::CompletionStream(err) => write!(f, "completion failed: {err}"),
            TemplateRunErrorKind::Render(err) => write!(f, "render error: {err}"),
            TemplateRunErrorKind::Output(err) => write!(f, "failed to write output: {err}"),
        }
    }
}

impl From<VariablePromptError> for TemplateRunErrorKind {
    fn from(err: VariablePromptError) -> Self {
        TemplateRunErrorKind::VariablePrompt(err)
    }
}

impl From<CompletionError> for TemplateRunErrorKind {
    fn from(err: CompletionError) -> Self {
        TemplateRunErrorKind::CompletionStream(err)
    }
}

impl From<EchoError> for TemplateRunErrorKind {
    fn from(err: EchoError) -> Self {
        match err {
            EchoError::Stream(err) => TemplateRunErrorKind::CompletionStream(err),
            EchoError::Write(err) => TemplateRunErrorKind::Output(err),
        }
    }
}

impl From<minijinja::Error> for TemplateRunErrorKind {
    fn from(err: minijinja::Error) -> Self {
        TemplateRunErrorKind::Render(err)
    }
}

impl From<io::Error> for TemplateRunErrorKind {
    fn from(err: io::Error) -> Self {
        TemplateRunErrorKind::Output(err)
    }
}

/// A template run that stopped early. The chat built up to the failing
/// section stays available for inspection.
#[derive(Debug)]
pub struct TemplateRunError {
    template: String,
    section: usize,
    kind: TemplateRunErrorKind,
    partial: Chat,
}

impl TemplateRunError {
    pub(crate) fn new(
        template: &str,
        section: usize,
        kind: TemplateRunErrorKind,
        partial: Chat,
    ) -> Self {
        Self {
            template: template.to_string(),
            section,
            kind,
            partial,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Zero-based index of the failing section.
    pub fn section(&self) -> usize {
        self.section
    }

    pub fn kind(&self) -> &TemplateRunErrorKind {
        &self.kind
    }

    pub fn partial_chat(&self) -> &Chat {
        &self.partial
    }

    pub fn into_partial_chat(self) -> Chat {
        self.partial
    }
}

impl fmt::Display for TemplateRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "template '{}' failed in section {}: {}",
            self.template,
            self.section + 1,
            self.kind
        )
    }
}

impl std::error::Error for TemplateRunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            TemplateRunErrorKind::VariablePrompt(err) => Some(err),
            TemplateRunErrorKind::CompletionStream(err) => Some(err),
            TemplateRunErrorKind::Render(err) => Some(err),
            TemplateRunErrorKind::Output(err) => Some(err),
        }
    }
}
