pub mod builtin_providers;
pub mod chat_stream;
pub mod completion;
pub mod config;
pub mod message;
pub mod providers;
