//! Self-updating game launcher core.
//!
//! [`check_for_updates`] fetches the remote version manifest, replaces the
//! launcher itself when a newer build is published, and keeps the local
//! "system" bundle in sync with the advertised version. Progress is reported
//! as [`Status`] events; turning them into text is up to the host.

pub mod bundle;
pub mod config;
pub mod error;
pub mod fetch;
pub mod game;
pub mod locale;
pub mod logging;
pub mod manifest;
pub mod mega;
pub mod replace;
pub mod status;
pub mod updater;
mod utils;

pub use config::{LauncherConfig, LauncherPaths};
pub use status::{Outcome, Status, StatusSink, UpdateReport};
pub use updater::{check_for_updates, Updater};
