//! Record shell sessions as ordered steps, then replay, rewind, branch and
//! diff them.
//!
//! The core lives in [`branch`], [`breakpoints`], [`diff`] and [`replay`];
//! none of it prints or sleeps. [`player`] and [`recorder`] are the
//! terminal-facing layers, and [`db::Database`] is the `SQLite`
//! implementation of [`store::SessionStore`].

pub mod branch;
pub mod breakpoints;
pub mod cli;
pub mod config;
pub mod db;
pub mod diff;
pub mod display;
pub mod error;
pub mod export;
pub mod models;
pub mod player;
pub mod process;
pub mod recorder;
pub mod replay;
pub mod session;
pub mod store;

pub use error::{Result, RewindError};
