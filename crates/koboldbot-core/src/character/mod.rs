//! Character-definition command handling.

pub mod definition;
