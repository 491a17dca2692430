//! Terminal UI for interactive chat sessions.
//!
//! - [`app`]: chat state and the transitions driven by keys and stream updates.
//! - [`render`]: draws the title bar, transcript and input box.
//! - [`chat_loop`]: owns the terminal, reads events and runs completion streams.

pub mod app;
pub mod chat_loop;
pub mod render;
