//! Core identities (vendor:library:name:version) and dependency constraints.
//!
//! An identity is the universal key for lookup, caching and error
//! reporting. Queries may leave components out; an absent component
//! matches any value. Equality is always exact over all four components.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{CoreError, Result};
use crate::version::{Version, VersionOp};

/// A versioned, hierarchical core identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vlnv {
    vendor: Option<String>,
    library: Option<String>,
    name: String,
    version: Option<Version>,
}

impl Vlnv {
    /// An identity with only a name.
    pub fn named(name: &str) -> Self {
        Vlnv {
            vendor: None,
            library: None,
            name: name.to_string(),
            version: None,
        }
    }

    /// Parse `name`, `vendor:library:name` or `vendor:library:name:version`.
    ///
    /// Empty components are treated as absent.
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = |detail: &str| CoreError::MalformedIdentity {
            text: text.to_string(),
            detail: detail.to_string(),
        };

        let text = text.trim();
        if text.chars().any(char::is_whitespace) {
            return Err(malformed("identity must not contain whitespace"));
        }

        let parts: Vec<&str> = text.split(':').collect();
        let (vendor, library, name, version) = match parts.as_slice() {
            [name] => (None, None, *name, None),
            [vendor, library, name] => (non_empty(vendor), non_empty(library), *name, None),
            [vendor, library, name, version] => (
                non_empty(vendor),
                non_empty(library),
                *name,
                non_empty(version),
            ),
            _ => return Err(malformed("expected name, vendor:library:name or vendor:library:name:version")),
        };

        if name.is_empty() {
            return Err(malformed("name component is required"));
        }

        let version = match version {
            Some(v) => Some(Version::parse(&v).map_err(|_| malformed("version is not comparable"))?),
            None => None,
        };

        Ok(Vlnv {
            vendor,
            library,
            name: name.to_string(),
            version,
        })
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn library(&self) -> Option<&str> {
        self.library.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// The same identity with the version component dropped.
    ///
    /// Two identities with equal unversioned forms are the same core in
    /// different versions.
    pub fn unversioned(&self) -> Vlnv {
        Vlnv {
            version: None,
            ..self.clone()
        }
    }

    /// Check whether this identity, used as a query, matches `candidate`.
    pub fn matches(&self, candidate: &Vlnv) -> bool {
        matches(self, candidate)
    }

    /// A filesystem-safe rendering, used for build tree directories.
    pub fn sanitized_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(4);
        parts.extend(self.vendor());
        parts.extend(self.library());
        parts.push(&self.name);
        let version = self.version.as_ref().map(Version::as_str);
        parts.extend(version);
        parts
            .join("_")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }

    fn is_bare(&self) -> bool {
        self.vendor.is_none() && self.library.is_none()
    }
}

/// Partial match: every component present in `query` must equal the
/// corresponding component of `candidate`.
pub fn matches(query: &Vlnv, candidate: &Vlnv) -> bool {
    fn component(q: Option<&str>, c: Option<&str>) -> bool {
        q.is_none() || q == c
    }

    query.name == candidate.name
        && component(query.vendor(), candidate.vendor())
        && component(query.library(), candidate.library())
        && (query.version.is_none() || query.version == candidate.version)
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl fmt::Display for Vlnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bare() && self.version.is_none() {
            return f.write_str(&self.name);
        }
        write!(
            f,
            "{}:{}:{}",
            self.vendor().unwrap_or(""),
            self.library().unwrap_or(""),
            self.name
        )?;
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

impl Serialize for Vlnv {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A dependency constraint: an unversioned identity query plus an
/// optional relational version requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    query: Vlnv,
    requirement: Option<(VersionOp, Version)>,
}

impl Constraint {
    /// Parse a constraint such as `>=::uart:1.0`, `::uart:>=1.0`, `uart>=1.0`
    /// or `::uart:1.0` (exact).
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = |detail: &str| CoreError::MalformedIdentity {
            text: text.to_string(),
            detail: detail.to_string(),
        };
        let trimmed = text.trim();

        // Leading operator applies to the version component.
        if let Some((op, rest)) = VersionOp::strip_prefix(trimmed) {
            let identity = Vlnv::parse(rest)?;
            let version = identity
                .version
                .clone()
                .ok_or_else(|| malformed("operator given without a version"))?;
            return Ok(Constraint {
                query: identity.unversioned(),
                requirement: Some((op, version)),
            });
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        match parts.as_slice() {
            [vendor, library, name, version] => {
                let query = Vlnv::parse(&format!("{vendor}:{library}:{name}"))?;
                let requirement = if version.is_empty() {
                    None
                } else {
                    let (op, v) = VersionOp::strip_prefix(version).unwrap_or((VersionOp::Eq, *version));
                    Some((op, Version::parse(v).map_err(|_| malformed("version is not comparable"))?))
                };
                Ok(Constraint { query, requirement })
            }
            [single] => match VersionOp::find_infix(single) {
                Some((pos, op, version_at)) => {
                    let version = Version::parse(&single[version_at..])
                        .map_err(|_| malformed("version is not comparable"))?;
                    Ok(Constraint {
                        query: Vlnv::parse(&single[..pos])?,
                        requirement: Some((op, version)),
                    })
                }
                None => Ok(Constraint {
                    query: Vlnv::parse(single)?,
                    requirement: None,
                }),
            },
            _ => Ok(Constraint {
                query: Vlnv::parse(trimmed)?,
                requirement: None,
            }),
        }
    }

    /// The unversioned identity this constraint looks up.
    pub fn query(&self) -> &Vlnv {
        &self.query
    }

    /// The relational version requirement, if any.
    pub fn requirement(&self) -> Option<(VersionOp, &Version)> {
        self.requirement.as_ref().map(|(op, v)| (*op, v))
    }

    /// Check whether `candidate` satisfies this constraint.
    pub fn admits(&self, candidate: &Vlnv) -> bool {
        if !self.query.matches(candidate) {
            return false;
        }
        match &self.requirement {
            None => true,
            Some((op, wanted)) => op.admits(candidate.version(), wanted),
        }
    }
}

impl From<Vlnv> for Constraint {
    fn from(identity: Vlnv) -> Self {
        let requirement = identity.version.clone().map(|v| (VersionOp::Eq, v));
        Constraint {
            query: identity.unversioned(),
            requirement,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.requirement {
            None => write!(f, "{}", self.query),
            Some((op, version)) if self.query.is_bare() => {
                write!(f, "{}{op}{version}", self.query)
            }
            Some((op, version)) => write!(f, "{}:{op}{version}", self.query),
        }
    }
}
