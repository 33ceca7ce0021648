//! Command-line client for the Shelly Cloud hosting platform.
//!
//! [`client`] talks to the HTTP API, [`models`] wraps it with project-local
//! knowledge (the Cloudfile, git remotes, SSH keys) and [`cli`] turns both
//! into commands.

pub mod cli;
pub mod client;
pub mod config;
pub mod git;
pub mod models;
pub mod remote;
