//! Plain-text transcript logging enabled with `--log <file>`.

use crate::core::message::{Message, MessageRole};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct LoggingState {
    file_path: Option<PathBuf>,
}

impl LoggingState {
    pub fn new(log_file: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = &log_file {
            // Fail at startup rather than after the first completion.
            OpenOptions::new().create(true).append(true).open(path)?;
        }
        Ok(LoggingState {
            file_path: log_file,
        })
    }

    pub fn disabled() -> Self {
        LoggingState { file_path: None }
    }

    pub fn is_active(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn start_session(&self, label: &str) -> Result<(), Box<dyn std::error::Error>> {
        let timestamp = Utc::now().to_rfc3339();
        self.write_to_log(&format!("## {label} started at {timestamp}"))
    }

    pub fn log_message(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        let line = match message.role {
            MessageRole::System => format!("System: {}", message.content),
            MessageRole::User => format!("You: {}", message.content),
            MessageRole::Assistant if message.content.is_empty() => return Ok(()),
            MessageRole::Assistant => message.content.clone(),
        };
        self.write_to_log(&line)
    }

    fn write_to_log(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.file_path.as_deref() else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between messages, as on screen.
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }

    pub fn get_status_string(&self) -> String {
        match &self.file_path {
            None => "disabled".to_string(),
            Some(path) => format!(
                "active ({})",
                Path::new(path)
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
            ),
        }
    }
}
