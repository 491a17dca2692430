//! `juggler run <template>`

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::core::chat_stream::HttpCompletionProvider;
use crate::core::config::data::path_display;
use crate::core::config::Config;
use crate::core::message::Chat;
use crate::template::{load_glob, PromptResolver, RunContext, TemplateLoader};
use crate::utils::logging::LoggingState;

use super::resolve_session_or_exit;

pub struct RunRequest {
    pub model: String,
    pub template: String,
    pub context_glob: Option<String>,
    pub files: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct InputFileError {
    path: PathBuf,
    source: io::Error,
}

impl fmt::Display for InputFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to read input file {}: {}",
            self.path.display(),
            self.source
        )
    }
}

impl Error for InputFileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Full contents of each input file, in the order given.
pub fn read_inputs(files: &[PathBuf]) -> Result<Vec<String>, InputFileError> {
    files
        .iter()
        .map(|path| {
            std::fs::read_to_string(path).map_err(|source| InputFileError {
                path: path.clone(),
                source,
            })
        })
        .collect()
}

pub async fn run_template(
    config: &Config,
    request: RunRequest,
    logging: LoggingState,
) -> Result<(), Box<dyn Error>> {
    let loader = TemplateLoader::from_config(config);
    let Some(template) = loader.get_by_name(&request.model, &request.template)? else {
        eprintln!("⚠️  Template '{}' not found. Searched:", request.template);
        for dir in loader.dirs() {
            eprintln!("  {}", path_display(dir));
        }
        return Ok(());
    };

    let context = match request.context_glob.as_deref() {
        Some(pattern) => {
            info!(pattern, "Loading context files");
            load_glob(pattern)?
        }
        None => Vec::new(),
    };
    if request.context_glob.is_some() && context.is_empty() {
        warn!("Context pattern matched no files");
    }
    let inputs = read_inputs(&request.files)?;
    debug!(
        context = context.len(),
        inputs = inputs.len(),
        "Prepared run context"
    );

    let session = resolve_session_or_exit(config, template.model());
    let provider = HttpCompletionProvider::new(session);
    let mut resolver = PromptResolver::stdio();
    let mut stdout = io::stdout();

    if let Err(err) = logging.start_session(&format!("Template {}", template.name())) {
        warn!(error = %err, "Failed to write transcript header");
    }

    let ctx = RunContext::new(context, inputs);
    match template
        .run(&ctx, &mut resolver, &provider, &mut stdout)
        .await
    {
        Ok(chat) => {
            log_chat(&logging, &chat);
            Ok(())
        }
        Err(err) => {
            log_chat(&logging, err.partial_chat());
            eprintln!();
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    }
}

fn log_chat(logging: &LoggingState, chat: &Chat) {
    for message in chat.messages() {
        if let Err(err) = logging.log_message(message) {
            warn!(error = %err, "Failed to write transcript");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_inputs_in_order() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        std::fs::write(&first, "alpha").unwrap();
        std::fs::write(&second, "beta\n").unwrap();

        let inputs = read_inputs(&[second, first]).unwrap();
        assert_eq!(inputs, vec!["beta\n".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn missing_input_names_the_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.txt");
        let err = read_inputs(&[missing]).unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }
}
