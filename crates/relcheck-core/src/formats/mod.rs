//! # Wire Formats
//!
//! String-level encodings of the validator's inputs and outputs. File I/O is
//! left to the app layer.

pub mod dataset;
pub mod grammar;

pub use dataset::{dataset_from_json, dataset_to_json};
pub use grammar::grammar_from_toml;
