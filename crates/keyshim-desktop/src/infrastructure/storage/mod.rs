//! Storage infrastructure: configuration document loading.
//!
//! The `config` sub-module reads the TOML document from the path given on
//! the command line or from the platform-appropriate default location.

pub mod config;
