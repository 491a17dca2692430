//! `juggler shell`

use std::error::Error;
use std::io;

use crate::core::chat_stream::HttpCompletionProvider;
use crate::core::config::Config;
use crate::shell::{machine_info, render_system_prompt, ShellAgent};
use crate::template::TemplateLoader;
use crate::utils::logging::LoggingState;

use super::resolve_session_or_exit;

pub async fn run_shell(
    config: &Config,
    model: &str,
    logging: LoggingState,
) -> Result<(), Box<dyn Error>> {
    let session = resolve_session_or_exit(config, model);
    let provider = HttpCompletionProvider::new(session);

    let loader = TemplateLoader::from_config(config);
    let system_prompt = render_system_prompt(&loader, &machine_info().await)?;

    if let Err(err) = logging.start_session("Shell session") {
        tracing::warn!(error = %err, "Failed to write transcript header");
    }

    println!("🐚 Shell assistant using {model}. Empty line or Ctrl+D to exit.");
    let mut agent = ShellAgent::new(
        model,
        &provider,
        system_prompt,
        io::stdin().lock(),
        io::stdout(),
        logging,
    );
    agent.run().await?;
    Ok(())
}
