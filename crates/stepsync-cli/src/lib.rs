//! Command-line explorer for MIUI step-count databases.
//!
//! Loads the `Steps.db` database a Xiaomi phone keeps, shows hourly, daily and
//! monthly step totals, and pulls a fresh copy from a rooted phone over the
//! Android Debug Bridge.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `load` | Load a database and print a summary |
//! | `day` | Hourly steps for one day |
//! | `month` | Daily steps for one month |
//! | `year` | Monthly steps for one year |
//! | `devices` | List attached devices |
//! | `connect` | Attach a device over the network |
//! | `sync` | Pull the database from the phone and load it |
//!
//! # Configuration
//!
//! See [`config::Config`]. The file is read from
//! [`config::default_config_path`] unless `--config` or `STEPSYNC_CONFIG`
//! names another.

pub mod cli;
pub mod config;
pub mod logging;
pub mod output;
pub mod session;
