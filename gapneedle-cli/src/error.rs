//! Error handling for the GapNeedle CLI

use std::path::PathBuf;
use thiserror::Error;

use gapneedle_core::aligner::AlignerError;

/// User-facing errors that come with suggestions
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Sequence '{name}' not found in {}", .path.display())]
    SequenceNotFound { name: String, path: PathBuf },

    #[error("No alignment of {query} onto {target} in {}", .path.display())]
    NoAlignment {
        target: String,
        query: String,
        path: PathBuf,
    },

    #[error("External tool error: {tool} - {message}")]
    ExternalTool { tool: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found<P: Into<PathBuf>>(path: P) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn sequence_not_found<S: Into<String>, P: Into<PathBuf>>(name: S, path: P) -> Self {
        Self::SequenceNotFound {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn external_tool<S: Into<String>>(tool: S, message: S) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(format!("TOML serialization error: {}", err))
    }
}

/// Lift the aligner failures a user can act on; everything else stays as is.
pub fn from_aligner_error(err: AlignerError) -> anyhow::Error {
    match err {
        AlignerError::ToolNotFound(tool) => {
            CliError::external_tool(tool, "binary not found on PATH".to_string()).into()
        }
        AlignerError::ToolFailed { tool, status, stderr } => {
            CliError::external_tool(tool, format!("exited with {}: {}", status, stderr.trim())).into()
        }
        AlignerError::SequenceNotFound { name, path } => CliError::sequence_not_found(name, path).into(),
        other => other.into(),
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::SequenceNotFound { path, .. } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • List the available names with 'gapneedle names {}'\n\
                 • Names are matched on the first word of the FASTA header",
                path.display()
            ));
        }

        CliError::NoAlignment { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check the order of --target and --query (PAF columns 6 and 1)\n\
                 • Use 'gapneedle overlaps' to list the alignments that exist",
            );
        }

        CliError::ExternalTool { tool, .. } => {
            if tool.ends_with("minimap2") {
                message.push_str(
                    "\n\nSuggestions:\n\
                     • Install minimap2: https://github.com/lh3/minimap2\n\
                     • Ensure minimap2 is in your PATH or set [align] minimap2 in gapneedle.toml",
                );
            } else {
                message.push_str(&format!(
                    "\n\nSuggestions:\n\
                     • Install {}\n\
                     • Ensure {} is in your PATH",
                    tool, tool
                ));
            }
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your gapneedle.toml configuration file\n\
                 • Use 'gapneedle config' to generate a sample configuration",
            );
        }

        CliError::Validation { .. } => {}
    }

    message
}
