//! Core types for Strongbox.

mod access;

pub use access::*;
