//! Error handling for clientdeps
//!
//! Two layers, following the same split everywhere in the crate:
//! - [`ClientDepsError`] - strongly-typed failures raised by parsers, loaders
//!   and configuration
//! - [`ErrorContext`] - a user-facing wrapper with details and a suggestion,
//!   produced by [`user_friendly_error`] at the CLI edge
//!
//! Resolution itself never surfaces these errors to callers. A manifest that
//! fails to parse or a resource that cannot be read is logged where it
//! happens and the affected subtree resolves to nothing, so a single broken
//! dependency never aborts an entire page. The typed errors exist so that the
//! loaders can report precisely what went wrong before degrading.
//!
//! # Examples
//!
//! ```rust,no_run
//! use clientdeps::core::{ClientDepsError, user_friendly_error};
//!
//! let err = ClientDepsError::InvalidMode {
//!     mode: "staging".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for clientdeps operations.
#[derive(Error, Debug)]
pub enum ClientDepsError {
    /// A library manifest could not be parsed.
    ///
    /// Raised by [`crate::manifest::parse_manifest`]; the resolver logs it and
    /// resolves the library to nothing.
    #[error("Invalid library manifest {file}: {reason}")]
    ManifestParseError {
        /// Logical path of the manifest
        file: String,
        /// Parser message
        reason: String,
    },

    /// A resource exists but its bytes could not be read.
    #[error("Failed to read resource {path}")]
    ResourceReadError {
        /// Logical path of the resource
        path: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Configuration file was syntactically valid but semantically wrong.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Configuration file could not be parsed.
    #[error("Invalid configuration file syntax in {file}")]
    ConfigParseError {
        /// Path to the configuration file
        file: String,
        /// Parser message
        reason: String,
    },

    /// Unknown resolution mode string.
    #[error("Invalid mode '{mode}': expected dev, production or both")]
    InvalidMode {
        /// The rejected mode
        mode: String,
    },

    /// Unknown asset type string.
    #[error("Invalid asset type '{asset_type}': expected script, style or manifest")]
    InvalidAssetType {
        /// The rejected asset type
        asset_type: String,
    },

    /// The watch service refused a registration.
    #[error("Failed to watch {path}: {reason}")]
    WatchError {
        /// Directory that could not be watched
        path: String,
        /// Reason reported by the watch backend
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Error context wrapper that provides user-friendly error information.
///
/// Carries the rendered error message plus optional details and a
/// suggestion. Built by [`user_friendly_error`] and printed by the CLI.
#[derive(Debug)]
pub struct ErrorContext {
    /// The rendered error message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new context for an error message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error with colors to stderr.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is
/// known.
///
/// The full `anyhow` chain is kept in the message so that context added with
/// `.context(..)` at the edges is not lost.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let message = format!("{error:#}");

    if let Some(err) = error.downcast_ref::<ClientDepsError>() {
        return match err {
            ClientDepsError::ManifestParseError {
                file,
                ..
            } => ErrorContext::new(message)
                .with_details(format!("{file} is not a well-formed <libraries> document"))
                .with_suggestion("Check the XML syntax and that every entry carries a path or name attribute"),
            ClientDepsError::ConfigParseError {
                reason,
                ..
            } => ErrorContext::new(message)
                .with_details(reason.clone())
                .with_suggestion("Check the TOML syntax of your clientdeps.toml"),
            ClientDepsError::InvalidMode {
                ..
            } => ErrorContext::new(message).with_suggestion("Use one of: dev, production, both"),
            ClientDepsError::InvalidAssetType {
                ..
            } => ErrorContext::new(message)
                .with_suggestion("Use one of: script, style, manifest, all"),
            ClientDepsError::WatchError {
                ..
            } => ErrorContext::new(message).with_details(
                "The operating system refused the file watch; check inotify/FSEvents limits",
            ),
            _ => ErrorContext::new(message),
        };
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::NotFound {
            return ErrorContext::new(message)
                .with_suggestion("Check that the file or directory exists and the path is correct");
        }
    }

    if error.downcast_ref::<toml::de::Error>().is_some() {
        return ErrorContext::new(message)
            .with_suggestion("Check the TOML syntax of your clientdeps.toml");
    }

    ErrorContext::new(message)
}
