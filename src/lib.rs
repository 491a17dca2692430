//! Juggler is a terminal client for LLM chat providers.
//!
//! The crate is organized around a few collaborating layers:
//! - [`core`] owns the chat model, provider resolution, configuration and the
//!   streaming completion contract.
//! - [`template`] loads sectioned prompt templates and runs them, mixing
//!   prompted variables with streamed completions.
//! - [`shell`] is a small assistant that proposes and runs shell commands.
//! - [`ui`] renders the interactive chat and runs its event loop.
//! - [`api`] defines the wire payloads exchanged with providers.
//!
//! The binary routes through [`crate::cli::main`], which dispatches to the
//! surfaces above.

pub mod api;
pub mod cli;
pub mod core;
pub mod shell;
pub mod template;
pub mod ui;
pub mod utils;
