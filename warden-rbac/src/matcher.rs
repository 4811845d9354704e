//! # Permission matching
//!
//! Decides whether a permission request string such as `"edit blog"` is
//! granted by a set of stored permissions.
//!
//! ```text
//! "*"                        -> any action on any resource ("* *")
//! "<action> <resource>"      -> e.g. "edit blog"
//! "<action> <field> <resource>" -> e.g. "edit title blog"
//! ```
//!
//! A stored resource equal to the requested one (or `*`) always matches,
//! dots included. Otherwise its last `.` segment is read as a field scope
//! `"<resource>.<field>"`:
//!
//! | stored resource | `edit blog` | `edit title blog` | `edit body blog` | `edit api.v1` |
//! |-----------------|-------------|-------------------|------------------|---------------|
//! | `blog`          | yes         | yes               | yes              | no            |
//! | `blog.*`        | yes         | yes               | yes              | no            |
//! | `blog.title`    | no          | yes               | no               | no            |
//! | `*`             | yes         | yes               | yes              | yes           |
//! | `*.title`       | no          | yes               | no               | no            |
//! | `api.v1`        | no          | no                | no               | yes           |

use crate::actions::WILDCARD;
use crate::permissions::Permission;

/// A parsed permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionRequest<'a> {
    /// Requested action, may be `*`.
    pub action: &'a str,
    /// Requested field, only for three-token requests.
    pub field: Option<&'a str>,
    /// Requested resource, may be `*`.
    pub resource: &'a str,
}

impl<'a> PermissionRequest<'a> {
    /// Parse a request string.
    ///
    /// A lone `*` is read as `"* *"`. Anything other than two or three
    /// whitespace-separated tokens is rejected.
    ///
    /// # Example
    ///
    /// ```
    /// use warden_rbac::matcher::PermissionRequest;
    ///
    /// let req = PermissionRequest::parse("edit blog").unwrap();
    /// assert_eq!(req.action, "edit");
    /// assert_eq!(req.resource, "blog");
    ///
    /// assert_eq!(PermissionRequest::parse("*"), PermissionRequest::parse("* *"));
    /// assert!(PermissionRequest::parse("edit").is_none());
    /// ```
    pub fn parse(requested: &'a str) -> Option<Self> {
        let requested = requested.trim();
        if requested == WILDCARD {
            return Some(Self {
                action: WILDCARD,
                field: None,
                resource: WILDCARD,
            });
        }

        let tokens: Vec<&str> = requested.split_whitespace().collect();
        match tokens[..] {
            [action, resource] => Some(Self {
                action,
                field: None,
                resource,
            }),
            [action, field, resource] => Some(Self {
                action,
                field: Some(field),
                resource,
            }),
            _ => None,
        }
    }

    /// Whether a single stored permission grants this request.
    ///
    /// Undecodable action lists grant nothing.
    pub fn is_granted_by(&self, permission: &Permission) -> bool {
        let Some(actions) = permission.actions() else {
            return false;
        };
        if !actions.grants(self.action) {
            return false;
        }

        let stored = permission.resource.as_str();
        if stored == WILDCARD || stored == self.resource {
            return true;
        }

        // Not an exact match; read the last `.` segment as a field scope.
        let Some((resource, scope)) = stored.rsplit_once('.') else {
            return false;
        };
        if resource != WILDCARD && resource != self.resource {
            return false;
        }

        match (scope, self.field) {
            (WILDCARD, _) => true,
            (scope, Some(field)) => scope == field,
            (_, None) => false,
        }
    }
}

/// Whether any of `granted` satisfies `requested`.
///
/// Returns `false` for unparsable requests and for an empty grant list.
///
/// # Example
///
/// ```
/// use warden_rbac::{resolve_permission, ActionList, Permission};
///
/// let perms = vec![Permission::new(1, "*", &ActionList::new(["view"]))];
/// assert!(resolve_permission(&perms, "view any_resource"));
/// assert!(!resolve_permission(&perms, "edit any_resource"));
/// ```
pub fn resolve_permission(granted: &[Permission], requested: &str) -> bool {
    let Some(request) = PermissionRequest::parse(requested) else {
        return false;
    };
    granted.iter().any(|perm| request.is_granted_by(perm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionList;

    fn perm(id: i64, resource: &str, actions: &[&str]) -> Permission {
        Permission::new(id, resource, &ActionList::new(actions.iter().copied()))
    }

    #[test]
    fn test_parse_shapes() {
        let req = PermissionRequest::parse("edit title blog").unwrap();
        assert_eq!(req.action, "edit");
        assert_eq!(req.field, Some("title"));
        assert_eq!(req.resource, "blog");

        assert!(PermissionRequest::parse("").is_none());
        assert!(PermissionRequest::parse("a b c d").is_none());
        assert!(PermissionRequest::parse("**").is_none());
    }

    #[test]
    fn test_wildcard_normalization() {
        let sets = vec![
            vec![],
            vec![perm(1, "*", &["*"])],
            vec![perm(1, "*", &["view"])],
            vec![perm(1, "blog", &["*"])],
        ];
        for set in sets {
            assert_eq!(resolve_permission(&set, "*"), resolve_permission(&set, "* *"));
        }
    }

    #[test]
    fn test_superuser_grants_everything() {
        let set = vec![perm(1, "blog", &["view"]), perm(2, "*", &["*"])];
        for request in ["*", "view blog", "delete users", "edit title blog", "* invoices"] {
            assert!(resolve_permission(&set, request), "{request}");
        }
    }

    #[test]
    fn test_exact_resource() {
        let set = vec![perm(1, "blog", &["view", "edit"])];
        assert!(resolve_permission(&set, "edit blog"));
        assert!(resolve_permission(&set, "view blog"));
        assert!(!resolve_permission(&set, "delete blog"));
        assert!(!resolve_permission(&set, "edit news"));
        assert!(!resolve_permission(&set, "*"));
    }

    #[test]
    fn test_no_matching_resource_or_action() {
        let set = vec![perm(1, "news", &["edit"]), perm(2, "blog", &["view"])];
        assert!(!resolve_permission(&set, "edit blog"));
    }

    #[test]
    fn test_wildcard_resource_analyst() {
        let analyst = vec![perm(1, "*", &["view"])];
        assert!(resolve_permission(&analyst, "view any_resource"));
        assert!(!resolve_permission(&analyst, "edit any_resource"));
    }

    #[test]
    fn test_wildcard_action_on_resource() {
        let set = vec![perm(1, "blog", &["*"])];
        assert!(resolve_permission(&set, "publish blog"));
        assert!(resolve_permission(&set, "* blog"));
        assert!(!resolve_permission(&set, "publish news"));
    }

    #[test]
    fn test_malformed_record_skipped() {
        let mut broken = perm(1, "*", &["*"]);
        broken.action = "not json".to_string();
        let set = vec![broken.clone(), perm(2, "blog", &["view"])];

        assert!(!resolve_permission(&[broken], "view blog"));
        assert!(resolve_permission(&set, "view blog"));
        assert!(!resolve_permission(&set, "edit blog"));
    }

    #[test]
    fn test_field_scoped_requests() {
        let set = vec![perm(1, "blog.title", &["edit"])];
        assert!(resolve_permission(&set, "edit title blog"));
        assert!(!resolve_permission(&set, "edit body blog"));
        assert!(!resolve_permission(&set, "edit blog"));

        let whole = vec![perm(1, "blog", &["edit"])];
        assert!(resolve_permission(&whole, "edit title blog"));

        let any_field = vec![perm(1, "blog.*", &["edit"])];
        assert!(resolve_permission(&any_field, "edit blog"));
        assert!(resolve_permission(&any_field, "edit body blog"));

        let any_resource_field = vec![perm(1, "*.title", &["edit"])];
        assert!(resolve_permission(&any_resource_field, "edit title news"));
        assert!(!resolve_permission(&any_resource_field, "edit news"));
    }

    #[test]
    fn test_dotted_resource_matches_exactly() {
        let set = vec![perm(1, "api.v1", &["view"]), perm(2, "files.txt", &["*"])];
        assert!(resolve_permission(&set, "view api.v1"));
        assert!(resolve_permission(&set, "delete files.txt"));
        assert!(resolve_permission(&set, "view id api.v1"));
        assert!(!resolve_permission(&set, "edit api.v1"));
        assert!(!resolve_permission(&set, "view api"));
        assert!(!resolve_permission(&set, "view api.v2"));

        let scoped = vec![perm(1, "api.v1.path", &["view"])];
        assert!(resolve_permission(&scoped, "view path api.v1"));
        assert!(!resolve_permission(&scoped, "view api.v1"));
    }

    #[test]
    fn test_unparsable_request_denied() {
        let set = vec![perm(1, "*", &["*"])];
        assert!(!resolve_permission(&set, "edit"));
        assert!(!resolve_permission(&set, ""));
    }
}
