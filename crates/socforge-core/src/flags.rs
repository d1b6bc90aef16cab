//! Use-flags and the conditions that gate file sets and dependency edges.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// The active set of use-flags for one resolution request.
///
/// Flags are carried unchanged through the whole traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Flags(BTreeSet<String>);

impl Flags {
    pub fn new() -> Self {
        Flags::default()
    }

    pub fn set(&mut self, flag: &str) {
        self.0.insert(flag.to_string());
    }

    pub fn with(mut self, flag: &str) -> Self {
        self.set(flag);
        self
    }

    pub fn is_set(&self, flag: &str) -> bool {
        self.0.contains(flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Flags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Flags(iter.into_iter().map(|s| s.as_ref().to_string()).collect())
    }
}

/// One term of a condition: `flag` requires the flag set, `!flag` requires it unset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlagTerm {
    pub flag: String,
    pub negated: bool,
}

impl FlagTerm {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.strip_prefix('!') {
            Some(flag) => FlagTerm {
                flag: flag.trim().to_string(),
                negated: true,
            },
            None => FlagTerm {
                flag: text.to_string(),
                negated: false,
            },
        }
    }

    fn holds(&self, flags: &Flags) -> bool {
        flags.is_set(&self.flag) != self.negated
    }
}

impl fmt::Display for FlagTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        f.write_str(&self.flag)
    }
}

/// A conjunction of flag terms. The empty condition always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Condition(Vec<FlagTerm>);

impl Condition {
    pub fn always() -> Self {
        Condition::default()
    }

    pub fn parse<S: AsRef<str>>(terms: &[S]) -> Self {
        Condition(
            terms
                .iter()
                .map(|t| FlagTerm::parse(t.as_ref()))
                .filter(|t| !t.flag.is_empty())
                .collect(),
        )
    }

    /// Check whether every term holds under `flags`.
    pub fn satisfied_by(&self, flags: &Flags) -> bool {
        self.0.iter().all(|t| t.holds(flags))
    }

    pub fn is_always(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self.0.iter().map(FlagTerm::to_string).collect();
        f.write_str(&terms.join(" && "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_condition_always_holds() {
        assert!(Condition::always().satisfied_by(&Flags::new()));
        assert!(Condition::parse::<&str>(&[]).satisfied_by(&Flags::new().with("x")));
    }

    #[test]
    fn positive_and_negated_terms() {
        let cond = Condition::parse(&["debug", "!fpga"]);
        assert!(cond.satisfied_by(&Flags::new().with("debug")));
        assert!(!cond.satisfied_by(&Flags::new()));
        assert!(!cond.satisfied_by(&Flags::new().with("debug").with("fpga")));
    }

    #[test]
    fn display() {
        let cond = Condition::parse(&["a", "!b"]);
        assert_eq!(cond.to_string(), "a && !b");
    }

    #[test]
    fn flags_from_iter() {
        let flags: Flags = ["b", "a"].into_iter().collect();
        assert_eq!(flags.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
