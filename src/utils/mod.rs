pub mod auth;
pub mod input;
pub mod logging;
pub mod url;
