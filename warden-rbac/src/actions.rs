//! # Actions
//!
//! Ordered action lists as granted by a permission.
//! Actions are free-form operation names (`view`, `edit`, ...); `*` grants all of them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token granting every action, or every resource when used as a resource.
pub const WILDCARD: &str = "*";

/// An ordered list of action names granted by a permission.
///
/// Persisted as a JSON array in the permission's `action` column, so the
/// order the actions were supplied in is preserved.
///
/// # Example
///
/// ```
/// use warden_rbac::actions::ActionList;
///
/// let actions = ActionList::new(["view", "edit"]);
/// assert_eq!(actions.encode(), r#"["view","edit"]"#);
/// assert!(actions.grants("edit"));
/// assert!(!actions.grants("delete"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ActionList(Vec<String>);

impl ActionList {
    /// Create an action list, keeping the order given.
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(actions.into_iter().map(Into::into).collect())
    }

    /// An action list granting every action.
    pub fn any() -> Self {
        Self(vec![WILDCARD.to_string()])
    }

    /// Decode the stored column form.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when `raw` is not an array of strings.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Encode into the stored column form.
    pub fn encode(&self) -> String {
        // A Vec<String> always serializes.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    /// Whether this list grants `action`, either literally or through `*`.
    pub fn grants(&self, action: &str) -> bool {
        self.0.iter().any(|a| a == WILDCARD || a == action)
    }

    /// Whether the list contains the `*` token.
    pub fn is_wildcard(&self) -> bool {
        self.0.iter().any(|a| a == WILDCARD)
    }

    /// Iterate the actions in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ActionList {
    /// Comma-joined form used in derived permission names.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl<S: Into<String>> FromIterator<S> for ActionList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keeps_order() {
        let actions = ActionList::new(["edit", "view", "delete"]);
        assert_eq!(actions.encode(), r#"["edit","view","delete"]"#);
        assert_eq!(actions.to_string(), "edit,view,delete");
    }

    #[test]
    fn test_decode() {
        let actions = ActionList::decode(r#"["view","*"]"#).unwrap();
        assert_eq!(actions.len(), 2);
        assert!(actions.is_wildcard());

        assert!(ActionList::decode("view,edit").is_err());
        assert!(ActionList::decode(r#"{"view":true}"#).is_err());
        assert!(ActionList::decode("").is_err());
    }

    #[test]
    fn test_grants() {
        let actions = ActionList::new(["view"]);
        assert!(actions.grants("view"));
        assert!(!actions.grants("edit"));
        assert!(!actions.grants("*"));

        assert!(ActionList::any().grants("anything"));
        assert!(!ActionList::default().grants("view"));
    }
}
