// src/exec/mod.rs

//! Process execution layer.
//!
//! The engine never touches OS processes directly; it talks to a
//! [`ProcessRunner`]. Production code uses [`OsProcessRunner`], which is
//! built on `tokio::process`; tests plug in a fake runner.
//!
//! - [`runner`] defines the trait, [`ExitReport`] and [`LaunchError`].
//! - [`os_runner`] spawns, watches and kills real processes.
//! - `tree` addresses everything a child started as one unit.
//! - [`args`] splits the raw argument string of a definition.

pub mod args;
pub mod os_runner;
pub mod runner;
mod tree;

pub use args::split_args;
pub use os_runner::OsProcessRunner;
pub use runner::{BoxFuture, ExitReport, LaunchError, ProcessRunner};
