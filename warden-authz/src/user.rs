//! Authorizable users
//!
//! The host application owns its user type; implementing
//! [`AuthorizableUser`] is all Warden needs from it.

/// A user whose roles and permissions can be checked.
///
/// # Examples
///
/// ```
/// use warden_authz::AuthorizableUser;
///
/// struct Account {
///     id: u64,
///     email: String,
/// }
///
/// impl AuthorizableUser for Account {
///     fn primary_key(&self) -> String {
///         self.id.to_string()
///     }
/// }
///
/// let account = Account { id: 7, email: "a@example.com".into() };
/// assert_eq!(account.primary_key(), "7");
/// ```
pub trait AuthorizableUser: Send + Sync {
    /// Value of the user's primary key column, as used in the role/user join.
    fn primary_key(&self) -> String;
}

impl<T: AuthorizableUser + ?Sized> AuthorizableUser for &T {
    fn primary_key(&self) -> String {
        (**self).primary_key()
    }
}

impl<T: AuthorizableUser + ?Sized> AuthorizableUser for std::sync::Arc<T> {
    fn primary_key(&self) -> String {
        (**self).primary_key()
    }
}

/// A bare primary key, for callers that do not hold a user value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserKey(pub String);

impl UserKey {
    /// Wrap a primary key value.
    pub fn new(pk: impl ToString) -> Self {
        Self(pk.to_string())
    }
}

impl AuthorizableUser for UserKey {
    fn primary_key(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_key() {
        assert_eq!(UserKey::new(15).primary_key(), "15");
        let by_ref = &UserKey::new("abc");
        assert_eq!(by_ref.primary_key(), "abc");
    }
}
