//! Prompt templates: sectioned Jinja documents that build a conversation.
//!
//! A template is split on `---` into sections. Each section may call
//! `system()`, `user()` or `assistant()` to switch the active role, may
//! reference free variables (asked from the operator) and can read the
//! `context` files and `inputs` handed to the run. Every non-empty section
//! becomes one message of the resulting [`Chat`](crate::core::message::Chat);
//! `assistant()` streams a completion from the model bound to the template.

pub mod context;
pub mod engine;
pub mod error;
pub mod loader;
pub mod section;
pub mod variables;

pub use context::{load_glob, ContextError, ContextFile, RunContext};
pub use engine::Template;
pub use error::{TemplateRunError, TemplateRunErrorKind};
pub use loader::{TemplateLoader, TemplateSummary};
pub use variables::{PromptResolver, ScriptedResolver, VariablePromptError, VariableResolver};

#[cfg(test)]
mod tests;
