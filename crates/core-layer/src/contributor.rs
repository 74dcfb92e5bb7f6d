//! Contributor identity: who produced a storyboard object.
//!
//! Contributors are value-like. `order` is the monotonic registration index a
//! coordinator assigns; `priority` is caller-set and sorts before order
//! (smaller = earlier). The fallback contributor carries maximum order and
//! priority so unattributed objects sort after everything attributed.

use std::fmt;

/// Caller-supplied stable contributor token. The empty token is not a valid
/// registration identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContributorId(String);

impl ContributorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContributorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContributorId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

#[derive(Debug, Clone)]
pub struct Contributor {
    pub id: ContributorId,
    pub name: String,
    pub order: u64,
    pub priority: i32,
}

impl Contributor {
    pub fn new(id: ContributorId, name: impl Into<String>, order: u64, priority: i32) -> Self {
        Self {
            id,
            name: name.into(),
            order,
            priority,
        }
    }

    /// Updated copy with a new priority; everything else is preserved.
    pub fn with_priority(&self, priority: i32) -> Self {
        Self {
            priority,
            ..self.clone()
        }
    }

    /// The sentinel contributor unattributed objects are remapped to.
    pub fn fallback() -> Self {
        Self {
            id: ContributorId::new("<default>"),
            name: "<default>".to_owned(),
            order: u64::MAX,
            priority: i32::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_priority_copies_everything_else() {
        let c = Contributor::new(ContributorId::from("scripts/Rain.cs"), "Rain", 3, 10);
        let updated = c.with_priority(-5);
        assert_eq!(updated.priority, -5);
        assert_eq!(updated.id, c.id);
        assert_eq!(updated.name, c.name);
        assert_eq!(updated.order, 3);
    }

    #[test]
    fn fallback_sorts_after_everything() {
        let fallback = Contributor::fallback();
        assert_eq!(fallback.order, u64::MAX);
        assert_eq!(fallback.priority, i32::MAX);
    }
}
