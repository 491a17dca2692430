//! Section-by-section execution of a prompt template.

use std::collections::BTreeMap;
use std::io::Write;

use minijinja::{Environment, ErrorKind, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::core::completion::{echo_fragments, CompletionProvider};
use crate::core::message::{Chat, Message};

use super::context::RunContext;
use super::error::{TemplateRunError, TemplateRunErrorKind};
use super::section::{split_sections, Directive, RoleState, Section};
use super::variables::{free_variables, VariableResolver, CONTEXT_VAR, INPUTS_VAR};

/// A prompt template bound to the model its completions are requested from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    source: String,
    model: String,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            model: model.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Executes every section in document order and returns the resulting
    /// conversation.
    ///
    /// Role markers, echoed SYSTEM/USER messages and streamed assistant
    /// fragments are written to `out` as they happen. The run stops at the
    /// first failing section; the error keeps the chat built so far.
    pub async fn run<R, W>(
        &self,
        ctx: &RunContext,
        resolver: &mut R,
        provider: &dyn CompletionProvider,
        out: &mut W,
    ) -> Result<Chat, TemplateRunError>
    where
        R: VariableResolver + ?Sized,
        W: Write + ?Sized,
    {
        info!(template = %self.name, model = %self.model, "Running template");

        let context = Value::from_serialize(&ctx.context);
        let inputs = Value::from_serialize(&ctx.inputs);
        let mut runner = Runner {
            model: &self.model,
            resolver,
            provider,
            out,
            chat: Chat::new(),
            state: RoleState::default(),
        };

        for section in split_sections(&self.source) {
            if let Err(kind) = runner.run_section(section, &context, &inputs).await {
                return Err(TemplateRunError::new(
                    &self.name,
                    section.index,
                    kind,
                    runner.chat,
                ));
            }
        }

        debug!(messages = runner.chat.len(), "Template run finished");
        Ok(runner.chat)
    }
}

/// A directive evaluated by the renderer, waiting for the runner to apply
/// it. Answering `None` makes the directive fail and the render stop.
struct DirectiveCall {
    directive: Directive,
    reply: oneshot::Sender<Option<String>>,
}

/// Binds `directive` for the renderer. Each evaluation is forwarded to the
/// runner and blocks until it has been applied.
fn directive_function(
    directive: Directive,
    calls: mpsc::UnboundedSender<DirectiveCall>,
) -> Value {
    Value::from_function(move || -> Result<String, minijinja::Error> {
        let (reply, answer) = oneshot::channel();
        calls
            .send(DirectiveCall { directive, reply })
            .ok()
            .and_then(|()| answer.blocking_recv().ok().flatten())
            .ok_or_else(|| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("{}() did not complete", directive.name()),
                )
            })
    })
}

struct Runner<'a, R: ?Sized, W: ?Sized> {
    model: &'a str,
    resolver: &'a mut R,
    provider: &'a dyn CompletionProvider,
    out: &'a mut W,
    chat: Chat,
    state: RoleState,
}

impl<R, W> Runner<'_, R, W>
where
    R: VariableResolver + ?Sized,
    W: Write + ?Sized,
{
    async fn run_section(
        &mut self,
        section: Section<'_>,
        context: &Value,
        inputs: &Value,
    ) -> Result<(), TemplateRunErrorKind> {
        let env = Environment::new();
        let template = env.template_from_str(section.body)?;

        let mut bindings: BTreeMap<String, Value> = BTreeMap::new();
        for name in free_variables(&template, section.body) {
            let value = self.resolver.resolve(&name)?;
            bindings.insert(name, Value::from(value));
        }
        bindings.insert(CONTEXT_VAR.to_string(), context.clone());
        bindings.insert(INPUTS_VAR.to_string(), inputs.clone());

        let (calls_tx, mut calls) = mpsc::unbounded_channel();
        for directive in Directive::ALL {
            bindings.insert(
                directive.name().to_string(),
                directive_function(directive, calls_tx.clone()),
            );
        }
        drop(calls_tx);

        // The renderer blocks inside directives, so it runs off the async
        // thread while this task applies each call as it arrives.
        let body = section.body.to_string();
        let mut render =
            tokio::task::spawn_blocking(move || Environment::new().render_str(&body, bindings));

        let mut applied = 0usize;
        let mut failure = None;
        let rendered = loop {
            tokio::select! {
                biased;
                Some(call) = calls.recv() => {
                    applied += 1;
                    let answer = match self.apply_directive(call.directive).await {
                        Ok(text) => Some(text),
                        Err(kind) => {
                            failure = Some(kind);
                            None
                        }
                    };
                    let _ = call.reply.send(answer);
                }
                joined = &mut render => break joined,
            }
        };
        if let Some(kind) = failure {
            return Err(kind);
        }
        let rendered = rendered.map_err(|err| {
            minijinja::Error::new(
                ErrorKind::InvalidOperation,
                format!("renderer stopped: {err}"),
            )
        })??;

        let content = rendered.trim();
        let role = self.state.role();

        // A section made only of directives is a role marker, not a message.
        if content.is_empty() && applied > 0 {
            debug!(section = section.index, "Directive-only section; no message");
            return Ok(());
        }

        if !role.is_assistant() {
            writeln!(self.out, "{content}")?;
        }
        debug!(section = section.index, %role, "Appending message");
        self.chat.add_message(Message::new(role, content));
        Ok(())
    }

    /// Switches the role and prints its marker; `assistant()` also streams a
    /// completion of the chat so far and yields its text.
    async fn apply_directive(
        &mut self,
        directive: Directive,
    ) -> Result<String, TemplateRunErrorKind> {
        let role = self.state.transition(directive);
        write!(self.out, "\n--- {role} ---\n\n")?;
        if !directive.requests_completion() {
            return Ok(String::new());
        }

        let stream = self
            .provider
            .stream_completion(self.model, self.chat.to_wire());
        Ok(echo_fragments(stream, &mut *self.out).await?)
    }
}
