//! Chaindrive command-line interface
//!
//! Operator surface over the client orchestration: key management, file
//! publishing, catalog listing, sharing, and visibility control.

pub mod cli;
pub mod keyfile;
