//! Utility functions for the ntag424 CLI

pub mod display;
pub mod reader;
