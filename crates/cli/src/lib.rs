//! PatternWatch CLI
//!
//! Command-line interface for managing visual regression patterns and
//! checking captured screenshots against them.

pub mod commands;
pub mod config;
pub mod output;
