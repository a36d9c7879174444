//! Resource identifiers and version tokens.
//!
//! A `Version` is handed out by a `Source` and handed back to it unchanged
//! on the next conditional load. The engine compares versions only for
//! equality when gating reloads; ordering is defined per variant and
//! different variants never compare.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use url::Url;

/// Descriptor of the tracked resource. Immutable once configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    /// A local file.
    Path(PathBuf),
    /// An HTTP(S) endpoint.
    Url(Url),
    /// A key inside an object store bucket.
    Object { bucket: String, key: String },
    /// A file at a given ref of a version-controlled tree.
    Revision { path: PathBuf, reference: String },
    /// Free-form name, used by in-process sources.
    Named(String),
}

impl ResourceId {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ResourceId::Path(path.into())
    }

    pub fn named(name: impl Into<String>) -> Self {
        ResourceId::Named(name.into())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Path(p) => write!(f, "{}", p.display()),
            ResourceId::Url(u) => write!(f, "{}", u),
            ResourceId::Object { bucket, key } => write!(f, "{}/{}", bucket, key),
            ResourceId::Revision { path, reference } => {
                write!(f, "{}@{}", path.display(), reference)
            }
            ResourceId::Named(n) => write!(f, "{}", n),
        }
    }
}

/// Opaque token describing an observed state of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// Never loaded.
    #[default]
    Empty,
    /// Last modification time.
    Modified(DateTime<Utc>),
    /// HTTP entity tag, compared by string equality.
    ETag(String),
    /// Commit or object revision identifier.
    Revision(String),
    /// Monotonic counter maintained by the source.
    Sequence(u64),
}

impl Version {
    pub fn is_empty(&self) -> bool {
        matches!(self, Version::Empty)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Version::Empty, Version::Empty) => Some(Ordering::Equal),
            (Version::Empty, _) => Some(Ordering::Less),
            (_, Version::Empty) => Some(Ordering::Greater),
            (Version::Modified(a), Version::Modified(b)) => a.partial_cmp(b),
            (Version::Sequence(a), Version::Sequence(b)) => a.partial_cmp(b),
            // Tags and revisions carry identity only.
            (Version::ETag(a), Version::ETag(b)) if a == b => Some(Ordering::Equal),
            (Version::Revision(a), Version::Revision(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Empty => write!(f, "<empty>"),
            Version::Modified(t) => write!(f, "{}", t.to_rfc3339()),
            Version::ETag(tag) => write!(f, "etag:{}", tag),
            Version::Revision(rev) => write!(f, "rev:{}", rev),
            Version::Sequence(n) => write!(f, "seq:{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_sorts_before_everything() {
        assert!(Version::Empty < Version::Sequence(0));
        assert!(Version::ETag("a".into()) > Version::Empty);
    }

    #[test]
    fn timestamps_are_ordered() {
        let earlier = Version::Modified(Utc.timestamp_opt(1_000, 0).unwrap());
        let later = Version::Modified(Utc.timestamp_opt(2_000, 0).unwrap());
        assert!(earlier < later);
    }

    #[test]
    fn tags_only_compare_for_identity() {
        let a = Version::ETag("\"abc\"".into());
        let b = Version::ETag("\"def\"".into());
        assert_eq!(a.partial_cmp(&a.clone()), Some(Ordering::Equal));
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn different_kinds_are_incomparable() {
        assert_eq!(Version::Sequence(1).partial_cmp(&Version::Revision("1".into())), None);
    }

    #[test]
    fn resource_display() {
        let id = ResourceId::Revision {
            path: "conf/app.toml".into(),
            reference: "main".into(),
        };
        assert_eq!(id.to_string(), "conf/app.toml@main");
    }
}
