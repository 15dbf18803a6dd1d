//! Core types and error handling for packup.
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`PackupError`]) for precise handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! Operations return `anyhow::Result` at the edges; domain failures are
//! expressed as [`PackupError`] variants so callers can match on them. The
//! CLI entry point converts any error into an [`ErrorContext`] via
//! [`user_friendly_error`] before display.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Which installation root a package lives under.
///
/// The repository serves both kinds; backups encode the kind in their
/// filename so a restore can pick the right destination root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PackageKind {
    /// A package installed under the plugins root.
    Plugin,
    /// A package installed under the themes root.
    Theme,
}

impl PackageKind {
    /// The lowercase name used in backup filenames and log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plugin => "plugin",
            Self::Theme => "theme",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for packup operations.
///
/// Transport failures against the repository index are deliberately *not*
/// represented here: the index layer fails soft and returns an empty list
/// instead (see [`crate::registry`]). Everything that reaches the user as
/// a hard failure goes through one of these variants.
#[derive(Error, Debug)]
pub enum PackupError {
    /// No descriptor with the requested slug exists in the repository index.
    #[error("Package '{slug}' was not found in the repository index")]
    UpdateNotFound {
        /// The slug that was looked up.
        slug: String,
    },

    /// The downloaded archive extracted to nothing, or to no directory.
    #[error("Archive is empty or has no package directory")]
    EmptyArchive,

    /// A package or release download failed.
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed {
        /// The URL that was requested.
        url: String,
        /// Why the download failed.
        reason: String,
    },

    /// The downloaded file did not match the checksum in its descriptor.
    #[error("Checksum verification failed for {file}")]
    ChecksumMismatch {
        /// The file that failed verification.
        file: String,
    },

    /// A backup archive with the given filename does not exist.
    #[error("Backup not found: {file}")]
    BackupNotFound {
        /// The filename that was requested.
        file: String,
    },

    /// The slug derived from a backup filename contains path characters.
    #[error("Invalid package slug derived from backup filename: '{slug}'")]
    InvalidBackupSlug {
        /// The rejected slug.
        slug: String,
    },

    /// The restore destination resolved to the installation root itself.
    #[error("Restore destination resolves to the installation root")]
    InvalidRestoreDestination,

    /// A backup could not be created before an update.
    #[error("Could not back up '{slug}': {reason}")]
    BackupFailed {
        /// The package that was being backed up.
        slug: String,
        /// Why the backup failed.
        reason: String,
    },

    /// Configuration file problems.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error.
        message: String,
    },

    /// The self-update process failed after download.
    #[error("Self-update failed: {reason}")]
    SelfUpdateFailed {
        /// Why the self-update failed.
        reason: String,
    },

    /// I/O errors from [`std::io::Error`].
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Zip archive errors from the `zip` crate.
    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),
}

/// An error paired with a suggestion and optional details for display.
///
/// Produced by [`user_friendly_error`] at the CLI boundary. `display`
/// writes a colored notice to stderr; the process then exits non-zero.
pub struct ErrorContext {
    /// The underlying error.
    pub error: anyhow::Error,
    /// A short actionable hint, when one is known for the failure.
    pub suggestion: Option<String>,
}

impl ErrorContext {
    /// Wrap an error without a suggestion.
    pub fn new(error: anyhow::Error) -> Self {
        Self { error, suggestion: None }
    }

    /// Attach a suggestion shown under the error message.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Print the error (and its cause chain) to stderr with colors.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);
        for cause in self.error.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("  {} {}", "hint:".cyan(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Known [`PackupError`] variants get a suggestion that points at the most
/// likely fix; everything else is passed through unchanged.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let suggestion = match error.downcast_ref::<PackupError>() {
        Some(PackupError::UpdateNotFound { .. }) => Some(
            "Run `packup list` to see available packages, or check the repository URL with `packup config show`"
                .to_string(),
        ),
        Some(PackupError::BackupNotFound { .. }) => {
            Some("Run `packup backup list` to see available backups".to_string())
        }
        Some(PackupError::InvalidBackupSlug { .. } | PackupError::InvalidRestoreDestination) => {
            Some("The backup filename does not follow the expected naming convention".to_string())
        }
        Some(PackupError::DownloadFailed { .. }) => {
            Some("Check your network connection and the configured repository URL".to_string())
        }
        Some(PackupError::ChecksumMismatch { .. }) => {
            Some("The download may be corrupted; retry the operation".to_string())
        }
        Some(PackupError::ConfigError { .. }) => {
            Some("Inspect the config file with `packup config show`".to_string())
        }
        _ => None,
    };

    let ctx = ErrorContext::new(error);
    match suggestion {
        Some(s) => ctx.with_suggestion(s),
        None => ctx,
    }
}
