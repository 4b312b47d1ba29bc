//! Small shared helpers: identifier generation and path hygiene.

pub mod ids;
pub mod paths;
