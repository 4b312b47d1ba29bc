//! Run identifier generation.
//!
//! The execution service names runs with the first eight characters of a
//! v4 UUID. The in-process service implementation and tests generate ids in
//! the same shape so logs and fixtures read like production traffic.

use uuid::Uuid;

/// Length of a generated run identifier.
pub const RUN_ID_LEN: usize = 8;

/// Generator for service-style run identifiers.
///
/// # Examples
///
/// ```rust
/// use skein::utils::ids::IdGenerator;
///
/// let id = IdGenerator::new().generate_run_id();
/// assert_eq!(id.len(), 8);
/// assert!(id.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGenerator;

impl IdGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a fresh run identifier: the first eight characters of a
    /// hyphenated v4 UUID.
    #[must_use]
    pub fn generate_run_id(&self) -> String {
        let mut id = Uuid::new_v4().to_string();
        id.truncate(RUN_ID_LEN);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_short_and_distinct() {
        let generator = IdGenerator::new();
        let a = generator.generate_run_id();
        let b = generator.generate_run_id();
        assert_eq!(a.len(), RUN_ID_LEN);
        assert_eq!(b.len(), RUN_ID_LEN);
        assert_ne!(a, b);
    }
}
