//! Core versions and relational version constraints.
//!
//! Core versions are dotted numerics with an optional `-rN` revision
//! (`1.2`, `1.2.3`, `1.2-r4`). They are normalised onto `semver` for
//! comparison while the original text is kept for display.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

use crate::error::{CoreError, Result};

/// A parsed core version.
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    base: semver::Version,
    revision: u64,
}

impl Version {
    /// Parse a version string like "1.0", "1.2.3" or "1.2-r1".
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = |detail: String| CoreError::MalformedIdentity {
            text: text.to_string(),
            detail,
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(malformed("empty version".to_string()));
        }

        let (body, revision) = match trimmed.rsplit_once("-r") {
            Some((body, rev)) if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) => {
                let rev = rev
                    .parse::<u64>()
                    .map_err(|e| malformed(format!("bad revision: {e}")))?;
                (body, rev)
            }
            _ => (trimmed, 0),
        };

        // Pad "1" and "1.2" out to three numeric components.
        let split_at = body.find(['-', '+']).unwrap_or(body.len());
        let (numeric, suffix) = body.split_at(split_at);
        let mut padded = numeric.to_string();
        for _ in numeric.split('.').count()..3 {
            padded.push_str(".0");
        }
        padded.push_str(suffix);

        let base = semver::Version::parse(&padded).map_err(|e| malformed(e.to_string()))?;
        Ok(Version {
            text: trimmed.to_string(),
            base,
            revision,
        })
    }

    /// The version text as written in the core file.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The normalised semantic version, without revision.
    pub fn base(&self) -> &semver::Version {
        &self.base
    }

    /// Packaging revision (`-rN`), 0 when absent.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.revision == other.revision
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        self.revision.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base
            .cmp(&other.base)
            .then(self.revision.cmp(&other.revision))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// Result of comparing two optional versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOrdering {
    Less,
    Equal,
    Greater,
    /// At least one side carries no version.
    Incomparable,
}

/// Compare two optional versions.
pub fn compare_version(a: Option<&Version>, b: Option<&Version>) -> VersionOrdering {
    match (a, b) {
        (Some(a), Some(b)) => match a.cmp(b) {
            Ordering::Less => VersionOrdering::Less,
            Ordering::Equal => VersionOrdering::Equal,
            Ordering::Greater => VersionOrdering::Greater,
        },
        _ => VersionOrdering::Incomparable,
    }
}

/// A relational operator in a dependency constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Same major (or same minor below 1.0), not lower.
    Caret,
    /// Same major and minor, not lower.
    Tilde,
}

impl VersionOp {
    /// Operator spellings, longest first so prefixes strip unambiguously.
    const SPELLINGS: [(&'static str, VersionOp); 9] = [
        (">=", VersionOp::Ge),
        ("<=", VersionOp::Le),
        ("==", VersionOp::Eq),
        ("!=", VersionOp::Ne),
        (">", VersionOp::Gt),
        ("<", VersionOp::Lt),
        ("=", VersionOp::Eq),
        ("^", VersionOp::Caret),
        ("~", VersionOp::Tilde),
    ];

    /// Strip a leading operator from `text`, returning it and the rest.
    pub fn strip_prefix(text: &str) -> Option<(VersionOp, &str)> {
        Self::SPELLINGS
            .iter()
            .find_map(|(s, op)| text.strip_prefix(*s).map(|rest| (*op, rest)))
    }

    /// Find the first operator inside `text`, returning its byte offset.
    pub fn find_infix(text: &str) -> Option<(usize, VersionOp, usize)> {
        let pos = text.find(['>', '<', '=', '!', '^', '~'])?;
        let (op, rest) = Self::strip_prefix(&text[pos..])?;
        Some((pos, op, text.len() - rest.len()))
    }

    /// Check whether `candidate` satisfies `self wanted`.
    ///
    /// A missing candidate version is incomparable and satisfies no operator.
    pub fn admits(&self, candidate: Option<&Version>, wanted: &Version) -> bool {
        let ordering = compare_version(candidate, Some(wanted));
        match (self, ordering) {
            (_, VersionOrdering::Incomparable) => false,
            (VersionOp::Eq, ord) => ord == VersionOrdering::Equal,
            (VersionOp::Ne, ord) => ord != VersionOrdering::Equal,
            (VersionOp::Gt, ord) => ord == VersionOrdering::Greater,
            (VersionOp::Ge, ord) => ord != VersionOrdering::Less,
            (VersionOp::Lt, ord) => ord == VersionOrdering::Less,
            (VersionOp::Le, ord) => ord != VersionOrdering::Greater,
            (VersionOp::Caret | VersionOp::Tilde, ord) => {
                let Some(candidate) = candidate else {
                    return false;
                };
                let op = if *self == VersionOp::Caret {
                    semver::Op::Caret
                } else {
                    semver::Op::Tilde
                };
                let comparator = semver::Comparator {
                    op,
                    major: wanted.base.major,
                    minor: Some(wanted.base.minor),
                    patch: Some(wanted.base.patch),
                    pre: wanted.base.pre.clone(),
                };
                comparator.matches(&candidate.base) && ord != VersionOrdering::Less
            }
        }
    }

    /// Canonical spelling of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionOp::Eq => "==",
            VersionOp::Ne => "!=",
            VersionOp::Gt => ">",
            VersionOp::Ge => ">=",
            VersionOp::Lt => "<",
            VersionOp::Le => "<=",
            VersionOp::Caret => "^",
            VersionOp::Tilde => "~",
        }
    }
}

impl fmt::Display for VersionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn short_versions_are_padded() {
        assert_eq!(v("1.2"), v("1.2.0"));
        assert_eq!(v("3"), v("3.0.0"));
        assert_eq!(v("1.2").as_str(), "1.2");
    }

    #[test]
    fn revisions_sort_above_base() {
        assert!(v("1.0-r1") > v("1.0"));
        assert!(v("1.0-r2") > v("1.0-r1"));
        assert!(v("1.0-r9") < v("1.1"));
        assert_eq!(v("1.0-r3").revision(), 3);
    }

    #[test]
    fn reject_incomparable_version() {
        assert!(Version::parse("latest").is_err());
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.x").is_err());
    }

    #[test]
    fn compare_optional_versions() {
        assert_eq!(
            compare_version(Some(&v("1.0")), Some(&v("2.0"))),
            VersionOrdering::Less
        );
        assert_eq!(
            compare_version(Some(&v("2.0")), Some(&v("2.0.0"))),
            VersionOrdering::Equal
        );
        assert_eq!(
            compare_version(Some(&v("2.1")), Some(&v("2.0"))),
            VersionOrdering::Greater
        );
        assert_eq!(
            compare_version(None, Some(&v("2.0"))),
            VersionOrdering::Incomparable
        );
    }

    #[test]
    fn relational_operators() {
        assert!(VersionOp::Ge.admits(Some(&v("2.0")), &v("2.0")));
        assert!(!VersionOp::Ge.admits(Some(&v("1.0")), &v("2.0")));
        assert!(VersionOp::Lt.admits(Some(&v("1.0")), &v("2.0")));
        assert!(VersionOp::Ne.admits(Some(&v("1.0")), &v("2.0")));
        assert!(VersionOp::Eq.admits(Some(&v("1.0.0")), &v("1.0")));
    }

    #[test]
    fn missing_version_admitted_by_nothing() {
        for op in [VersionOp::Eq, VersionOp::Ne, VersionOp::Ge, VersionOp::Lt, VersionOp::Caret] {
            assert!(!op.admits(None, &v("1.0")), "{op}");
        }
    }

    #[test]
    fn caret_and_tilde() {
        assert!(VersionOp::Caret.admits(Some(&v("1.9")), &v("1.2")));
        assert!(!VersionOp::Caret.admits(Some(&v("2.0")), &v("1.2")));
        assert!(VersionOp::Tilde.admits(Some(&v("1.2.7")), &v("1.2")));
        assert!(!VersionOp::Tilde.admits(Some(&v("1.3")), &v("1.2")));
    }

    #[test]
    fn operator_parsing() {
        assert_eq!(
            VersionOp::strip_prefix(">=1.0"),
            Some((VersionOp::Ge, "1.0"))
        );
        assert_eq!(VersionOp::strip_prefix("=1.0"), Some((VersionOp::Eq, "1.0")));
        assert_eq!(VersionOp::strip_prefix("1.0"), None);
        assert_eq!(
            VersionOp::find_infix("uart>=1.0"),
            Some((4, VersionOp::Ge, 6))
        );
    }
}
