//! Free-variable discovery and the resolvers that supply their values.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::LazyLock;

use regex::Regex;

use super::section::Directive;

/// Bound to the context files of a run.
pub const CONTEXT_VAR: &str = "context";
/// Bound to the input strings of a run.
pub const INPUTS_VAR: &str = "inputs";

/// Globals the renderer provides on its own.
const RENDERER_GLOBALS: &[&str] = &["range", "dict", "namespace", "debug", "loop", "self"];

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").expect("tag pattern is valid"));

/// Names that are never prompted for.
pub fn is_reserved(name: &str) -> bool {
    name == CONTEXT_VAR
        || name == INPUTS_VAR
        || Directive::is_directive_name(name)
        || RENDERER_GLOBALS.contains(&name)
}

/// Variables referenced but not bound inside `template`, ordered by the
/// first tag in `source` that mentions them.
pub fn free_variables(template: &minijinja::Template<'_, '_>, source: &str) -> Vec<String> {
    let mut names: Vec<(usize, String)> = template
        .undeclared_variables(false)
        .into_iter()
        .filter(|name| !is_reserved(name))
        .map(|name| (first_reference(source, &name).unwrap_or(usize::MAX), name))
        .collect();
    names.sort();
    names.into_iter().map(|(_, name)| name).collect()
}

fn first_reference(source: &str, name: &str) -> Option<usize> {
    TAG_RE.find_iter(source).find_map(|tag| {
        find_identifier(tag.as_str(), name).map(|offset| tag.start() + offset)
    })
}

fn find_identifier(haystack: &str, name: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(name).map(|(pos, _)| pos).find(|&pos| {
        let before = haystack[..pos].chars().next_back();
        let after = haystack[pos + name.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

/// The operator input channel could not produce a value.
#[derive(Debug)]
pub enum VariablePromptError {
    /// Input reached end-of-file before a line was read.
    Closed { name: String },
    /// Reading the input or writing the prompt failed.
    Io { name: String, source: io::Error },
    /// A scripted resolver had no answer left for the name.
    Unanswered { name: String },
}

impl fmt::Display for VariablePromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariablePromptError::Closed { name } => {
                write!(f, "input closed while reading variable '{name}'")
            }
            VariablePromptError::Io { name, source } => {
                write!(f, "failed to read variable '{name}': {source}")
            }
            VariablePromptError::Unanswered { name } => {
                write!(f, "no value available for variable '{name}'")
            }
        }
    }
}

impl std::error::Error for VariablePromptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VariablePromptError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Supplies a value for a free template variable.
pub trait VariableResolver {
    fn resolve(&mut self, name: &str) -> Result<String, VariablePromptError>;
}

impl<T: VariableResolver + ?Sized> VariableResolver for &mut T {
    fn resolve(&mut self, name: &str) -> Result<String, VariablePromptError> {
        (**self).resolve(name)
    }
}

/// Asks the operator for each value on a line-based channel, printing
/// `name: ` first.
pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptResolver<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> VariableResolver for PromptResolver<R, W> {
    fn resolve(&mut self, name: &str) -> Result<String, VariablePromptError> {
        let io_error = |source| VariablePromptError::Io {
            name: name.to_string(),
            source,
        };

        write!(self.output, "{name}: ").map_err(io_error)?;
        self.output.flush().map_err(io_error)?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(io_error)?;
        if read == 0 {
            return Err(VariablePromptError::Closed {
                name: name.to_string(),
            });
        }
        Ok(line.trim().to_string())
    }
}

/// Answers from prepared values, recording every name it was asked for.
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    answers: HashMap<String, VecDeque<String>>,
    asked: Vec<String>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer; repeated calls for one name are handed out in order.
    pub fn answer(mut self, name: &str, value: &str) -> Self {
        self.answers
            .entry(name.to_string())
            .or_default()
            .push_back(value.to_string());
        self
    }

    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl VariableResolver for ScriptedResolver {
    fn resolve(&mut self, name: &str) -> Result<String, VariablePromptError> {
        self.asked.push(name.to_string());
        self.answers
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| VariablePromptError::Unanswered {
                name: name.to_string(),
            })
    }
}
