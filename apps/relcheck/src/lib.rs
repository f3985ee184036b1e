//! # relcheck
//!
//! Command-line front end for `relcheck-core`: reads data sets and role
//! grammars from disk, runs the composite checker and prints its findings.

pub mod cli;
pub mod config;
