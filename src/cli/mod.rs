//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod complete;
pub mod list;
pub mod run;
pub mod settings;
pub mod shell;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::core::providers::{resolve_session, ProviderSession};
use crate::ui::chat_loop::run_chat;
use crate::utils::logging::LoggingState;

/// Environment variable holding the diagnostics filter (e.g. `juggler=debug`).
pub const LOG_FILTER_ENV: &str = "JUGGLER_LOG";

#[derive(Parser)]
#[command(name = "juggler", version)]
#[command(about = "Chat with LLMs and run prompt templates from the terminal")]
#[command(
    long_about = "Juggler is a terminal client for LLM providers. It runs an interactive chat, \
executes sectioned prompt templates that mix your input with streamed completions, \
continues files in place, and offers a small shell assistant.\n\n\
Configuration:\n\
  juggler set api-key <provider> <key>   Store an API key\n\
  juggler set default-model <model>      Pick the model used without --model\n\n\
Environment Variables:\n\
  OPENAI_API_KEY, ANTHROPIC_API_KEY, DEEPSEEK_API_KEY, GEMINI_API_KEY\n\
                        Provider keys used when none is stored\n\
  JUGGLER_CONFIG_DIR    Directory holding config.toml and prompts/\n\
  JUGGLER_PROMPTS_DIR   Extra template directory searched first\n\
  JUGGLER_LOG           Diagnostics filter written to stderr (default: warn)\n\n\
Chat controls:\n\
  Enter             Send the message\n\
  Esc               Stop the streaming response\n\
  F2                Start a new chat\n\
  Up/Down/PgUp/PgDn Scroll through chat history\n\
  Ctrl+C / Ctrl+Q   Quit the application"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use; a `provider/` prefix selects the provider explicitly
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append the conversation transcript to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat interface (default)
    Tui,
    /// List available templates
    List,
    /// Run a template
    Run {
        /// Template name, with or without the .j2 extension
        template: String,
        /// Glob (or directory) of files exposed to the template as `context`
        #[arg(long, value_name = "GLOB")]
        context_dir: Option<String>,
        /// Files whose contents are exposed to the template as `inputs`
        files: Vec<PathBuf>,
    },
    /// Ask the model to continue a file, appending the reply to it
    Complete {
        /// File to continue
        filename: PathBuf,
    },
    /// Start the shell assistant
    Shell,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value(s) for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
        /// Provider or directory the key applies to (optional)
        value: Option<String>,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded; keep the existing one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command.unwrap_or(Commands::Tui) {
        Commands::Set { key, value } => {
            if let Err(err) = settings::apply_set(key.as_deref(), &value) {
                err.print();
                std::process::exit(err.exit_code());
            }
            Ok(())
        }
        Commands::Unset { key, value } => {
            if let Err(err) = settings::apply_unset(&key, value.as_deref()) {
                err.print();
                std::process::exit(err.exit_code());
            }
            Ok(())
        }
        Commands::List => {
            let config = Config::load()?;
            list::list_templates(&config)
        }
        Commands::Run {
            template,
            context_dir,
            files,
        } => {
            let config = Config::load()?;
            let model = config.effective_model(args.model.as_deref());
            let logging = LoggingState::new(args.log)?;
            run::run_template(
                &config,
                run::RunRequest {
                    model,
                    template,
                    context_glob: context_dir,
                    files,
                },
                logging,
            )
            .await
        }
        Commands::Complete { filename } => {
            let config = Config::load()?;
            let model = config.effective_model(args.model.as_deref());
            complete::run_complete(&config, &model, &filename).await
        }
        Commands::Shell => {
            let config = Config::load()?;
            let model = config.effective_model(args.model.as_deref());
            let logging = LoggingState::new(args.log)?;
            shell::run_shell(&config, &model, logging).await
        }
        Commands::Tui => {
            let config = Config::load()?;
            let model = config.effective_model(args.model.as_deref());
            let session = resolve_session_or_exit(&config, &model);
            let logging = LoggingState::new(args.log)?;
            run_chat(model, session, logging).await
        }
    }
}

/// Resolves the provider for `model`, printing the failure with quick fixes
/// and exiting when no provider can serve it.
pub(crate) fn resolve_session_or_exit(config: &Config, model: &str) -> ProviderSession {
    match resolve_session(config, model) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{err}");
            let fixes = err.quick_fixes();
            if !fixes.is_empty() {
                eprintln!();
                eprintln!("💡 Quick fixes:");
                for fix in fixes {
                    eprintln!("  • {fix}");
                }
            }
            std::process::exit(err.exit_code());
        }
    }
}

#[cfg(test)]
mod tests;
