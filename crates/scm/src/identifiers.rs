//! Newtype identifiers for source-control names.
//!
//! Every name that crosses the boundary between a provider and this core is a
//! distinct newtype wrapping a `String`. This prevents accidentally passing a
//! [`SourceName`] where a [`HeadName`] is expected even though both are plain
//! text under the hood.

use serde::{Deserialize, Serialize};

/// Declares a non-empty name wrapping a `String`, readable with `as_str` and
/// printed verbatim.
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// `None` for an empty name; no other validation is done here.
            pub fn new(name: impl Into<String>) -> Option<Self> {
                let name = name.into();
                (!name.is_empty()).then_some(Self(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id! {
    /// The name of a head: a branch name (`"main"`), a tag (`"v1.2.0"`) or a
    /// change request reference (`"PR-42"`).
    HeadName
}

string_id! {
    /// A commit hash as reported by a provider.
    ///
    /// No format is enforced; providers differ in hash length and encoding.
    CommitSha
}

string_id! {
    /// The name by which events address a single source, typically the
    /// repository path (`"owner/repo"`).
    SourceName
}

string_id! {
    /// The name of an owner that groups many sources (an organisation or a
    /// user account).
    NavigatorName
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_are_rejected() {
        assert!(HeadName::new("").is_none());
        assert!(SourceName::new(String::new()).is_none());
    }

    #[test]
    fn display_matches_inner_value() {
        let name = HeadName::new("feature/x").unwrap();
        assert_eq!(name.to_string(), "feature/x");
        assert_eq!(name.as_str(), "feature/x");
    }
}
