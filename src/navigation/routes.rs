//! Static route classification used by the session guard.

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Pages that need a confirmed session.
pub const PROTECTED_PREFIXES: &[&str] = &["/dashboard", "/explore"];

/// Pages only meaningful without a session.
pub const AUTH_ONLY_PREFIXES: &[&str] = &[
    "/auth/login",
    "/auth/signup",
    "/auth/email-password",
    "/auth/otp",
    "/auth/otp-verify",
    "/auth/magic-link",
    "/auth/forgot-password",
];

/// Post-signup preference form; any session, confirmed or not.
pub const ONBOARDING_PREFIXES: &[&str] = &["/auth/onboarding"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Protected,
    AuthOnly,
    Onboarding,
}

impl RouteClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Protected => "protected",
            Self::AuthOnly => "auth_only",
            Self::Onboarding => "onboarding",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route prefix must start with '/' and not be the root: {0:?}")]
    InvalidPrefix(String),
    #[error("route prefix {prefix} ({class}) overlaps {other} ({other_class})")]
    Overlap {
        prefix: String,
        class: &'static str,
        other: String,
        other_class: &'static str,
    },
}

/// Disjoint partition of path prefixes into route classes.
///
/// Built once at startup and never modified afterwards.
#[derive(Clone, Debug)]
pub struct RouteTable {
    entries: Vec<(String, RouteClass)>,
}

impl RouteTable {
    /// Build a table, rejecting prefixes that would put a path in two classes.
    ///
    /// # Errors
    /// Returns an error for malformed prefixes or prefixes of different classes
    /// that cover a common path.
    pub fn new(
        protected: &[&str],
        auth_only: &[&str],
        onboarding: &[&str],
    ) -> Result<Self, RouteTableError> {
        let mut entries: Vec<(String, RouteClass)> = Vec::new();
        let groups = [
            (protected, RouteClass::Protected),
            (auth_only, RouteClass::AuthOnly),
            (onboarding, RouteClass::Onboarding),
        ];

        for (prefixes, class) in groups {
            for prefix in prefixes {
                if !prefix.starts_with('/') {
                    return Err(RouteTableError::InvalidPrefix((*prefix).to_string()));
                }
                let prefix = normalize_path(prefix);
                if prefix == "/" {
                    return Err(RouteTableError::InvalidPrefix(prefix));
                }
                if let Some((other, other_class)) = entries.iter().find(|(other, other_class)| {
                    *other_class != class
                        && (path_within(&prefix, other) || path_within(other, &prefix))
                }) {
                    return Err(RouteTableError::Overlap {
                        prefix,
                        class: class.as_str(),
                        other: other.clone(),
                        other_class: other_class.as_str(),
                    });
                }
                entries.push((prefix, class));
            }
        }

        Ok(Self { entries })
    }

    /// The table served by the application.
    #[must_use]
    pub fn standard() -> Self {
        let entries = PROTECTED_PREFIXES
            .iter()
            .map(|prefix| ((*prefix).to_string(), RouteClass::Protected))
            .chain(
                AUTH_ONLY_PREFIXES
                    .iter()
                    .map(|prefix| ((*prefix).to_string(), RouteClass::AuthOnly)),
            )
            .chain(
                ONBOARDING_PREFIXES
                    .iter()
                    .map(|prefix| ((*prefix).to_string(), RouteClass::Onboarding)),
            )
            .collect();
        Self { entries }
    }

    /// Class of the given request path, `None` when unclassified.
    #[must_use]
    pub fn classify(&self, path: &str) -> Option<RouteClass> {
        let path = normalize_path(path);
        self.entries
            .iter()
            .find(|(prefix, _)| path_within(&path, prefix))
            .map(|(_, class)| *class)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, RouteClass)> {
        self.entries
            .iter()
            .map(|(prefix, class)| (prefix.as_str(), *class))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Segment-aware prefix match: `/dashboard` covers `/dashboard/x` but not `/dashboards`.
#[must_use]
pub fn path_within(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Canonical form of a request path, as the static file service resolves it.
///
/// Drops the query and fragment, decodes percent-escapes, removes empty and
/// `.` segments and resolves `..` (never above the root). The result always
/// starts with `/` and has no trailing slash except for the root itself.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default()
        .trim();
    let decoded = percent_decode_str(path).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_is_a_valid_partition() {
        let table = RouteTable::new(PROTECTED_PREFIXES, AUTH_ONLY_PREFIXES, ONBOARDING_PREFIXES);
        assert!(table.is_ok());
    }

    #[test]
    fn classify_matches_segments_only() {
        let table = RouteTable::standard();
        assert_eq!(table.classify("/dashboard"), Some(RouteClass::Protected));
        assert_eq!(
            table.classify("/dashboard/profile"),
            Some(RouteClass::Protected)
        );
        assert_eq!(
            table.classify("/explore/python/basics"),
            Some(RouteClass::Protected)
        );
        assert_eq!(table.classify("/dashboards"), None);
        assert_eq!(table.classify("/auth/login"), Some(RouteClass::AuthOnly));
        assert_eq!(table.classify("/auth/otp-verify"), Some(RouteClass::AuthOnly));
        assert_eq!(
            table.classify("/auth/onboarding"),
            Some(RouteClass::Onboarding)
        );
    }

    #[test]
    fn unclassified_paths() {
        let table = RouteTable::standard();
        for path in ["/", "/welcome", "/verify-email", "/auth/confirm", "/auth/callback"] {
            assert_eq!(table.classify(path), None, "{path}");
        }
    }

    #[test]
    fn classify_ignores_query_and_trailing_slash() {
        let table = RouteTable::standard();
        assert_eq!(table.classify("/dashboard/"), Some(RouteClass::Protected));
        assert_eq!(
            table.classify("/auth/login?next=/dashboard"),
            Some(RouteClass::AuthOnly)
        );
    }

    #[test]
    fn overlapping_classes_are_rejected() {
        let result = RouteTable::new(&["/auth"], &["/auth/login"], &[]);
        assert!(matches!(result, Err(RouteTableError::Overlap { .. })));

        let result = RouteTable::new(&["/dashboard"], &[], &["/dashboard/setup"]);
        assert!(matches!(result, Err(RouteTableError::Overlap { .. })));
    }

    #[test]
    fn same_class_nesting_is_allowed() {
        let table = RouteTable::new(&["/dashboard", "/dashboard/progress"], &[], &[]);
        assert!(table.is_ok());
    }

    #[test]
    fn invalid_prefixes_are_rejected() {
        assert_eq!(
            RouteTable::new(&["dashboard"], &[], &[]).err(),
            Some(RouteTableError::InvalidPrefix("dashboard".to_string()))
        );
        assert!(RouteTable::new(&["/"], &[], &[]).is_err());
    }

    #[test]
    fn path_within_root_and_exact() {
        assert!(path_within("/anything", "/"));
        assert!(path_within("/welcome", "/welcome"));
        assert!(!path_within("/welcomes", "/welcome"));
    }

    #[test]
    fn normalize_path_cases() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/a/b/"), "/a/b");
        assert_eq!(normalize_path("/a?x=1"), "/a");
        assert_eq!(normalize_path("/a#frag"), "/a");
    }

    #[test]
    fn normalize_path_matches_file_resolution() {
        assert_eq!(normalize_path("//dashboard/"), "/dashboard");
        assert_eq!(normalize_path("/./dashboard/"), "/dashboard");
        assert_eq!(normalize_path("/%64ashboard/"), "/dashboard");
        assert_eq!(normalize_path("/dash%2Fboard"), "/dash/board");
        assert_eq!(normalize_path("/welcome/../dashboard"), "/dashboard");
        assert_eq!(normalize_path("/../../dashboard"), "/dashboard");
        assert_eq!(normalize_path("/./dashboard/index.html"), "/dashboard/index.html");
    }

    #[test]
    fn non_canonical_paths_keep_their_class() {
        let table = RouteTable::standard();
        for path in [
            "//dashboard/",
            "/./dashboard/",
            "/%64ashboard/",
            "/explore/../dashboard",
            "/auth/%6Cogin",
        ] {
            assert!(table.classify(path).is_some(), "{path} unclassified");
        }
        assert_eq!(table.classify("/%64ashboards"), None);
    }
}
