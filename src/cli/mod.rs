//! CLI module for trickshelf
//!
//! Handles command-line argument parsing and terminal output.

pub mod args;
pub mod display;

pub use args::{Args, Commands, Verbosity};
pub use display::TerminalMirror;
