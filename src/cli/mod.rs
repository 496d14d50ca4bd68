//! CLI module for the financial bot
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands};
