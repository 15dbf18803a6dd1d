//! packup - installer and updater for packages from a private repository.
//!
//! The repository is a plain HTTP endpoint serving a JSON index of
//! available packages plus downloadable zip archives. packup keeps local
//! installs in sync with it, takes zip backups before every change, and
//! can restore any backup by filename alone.
//!
//! Modules:
//! - [`registry`]: repository index client and installed-package discovery
//! - [`installer`]: download, verify, extract, and swap packages in place
//! - [`backup`]: backup archive creation and filename-driven restore
//! - [`upgrade`]: update evaluation plus self-update from GitHub releases
//! - [`bulk`]: sequential multi-package orchestration
//! - [`cache`]: file-backed TTL cache
//! - [`config`]: global configuration
//! - [`cli`]: command-line interface

pub mod backup;
pub mod bulk;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod installer;
pub mod registry;
pub mod upgrade;
pub mod version;
