//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Full Git object identifier (SHA)
//! - [`CommitPrefix`] - Possibly abbreviated commit hash used to key patches
//!
//! # Validation
//!
//! Values are checked once at construction. Pins read out of repository
//! files and hashes typed on the command line only enter the engine through
//! these constructors.
//!
//! # Examples
//!
//! ```
//! use uplift_unroll::core::types::{BranchName, CommitPrefix, Oid};
//!
//! let branch = BranchName::new("uplift/flattened").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let key = CommitPrefix::new("abc123de").unwrap();
//!
//! assert!(key.matches(&oid));
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid commit prefix: {0}")]
    InvalidPrefix(String),
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
///
/// # Example
///
/// ```
/// use uplift_unroll::core::types::BranchName;
///
/// let name = BranchName::new("uplift/flattened").unwrap();
/// assert_eq!(name.as_str(), "uplift/flattened");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("HEAD~1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let reject = |why: &str| Err(TypeError::InvalidBranchName(format!("'{name}': {why}")));

        if name.is_empty() {
            return reject("cannot be empty");
        }
        if name == "@" {
            return reject("'@' is reserved");
        }
        if name.starts_with('-') {
            return reject("cannot start with '-'");
        }
        if name.ends_with('/') {
            return reject("cannot end with '/'");
        }
        for pattern in ["..", "@{", "//"] {
            if name.contains(pattern) {
                return reject(&format!("cannot contain '{pattern}'"));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if let Some(c) = name
            .chars()
            .find(|c| INVALID_CHARS.contains(c) || c.is_ascii_control())
        {
            return reject(&format!("cannot contain {c:?}"));
        }

        for component in name.split('/') {
            if component.starts_with('.') {
                return reject("path component cannot start with '.'");
            }
            if component.ends_with(".lock") {
                return reject("path component cannot end with '.lock'");
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full ref name (`refs/heads/<branch>`).
    pub fn refname(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A full Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use uplift_unroll::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(8), "abc123de");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64 character hex id.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(format!("'{oid}' is not hexadecimal")));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters, or the full OID if `len` exceeds it.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A commit hash as typed by a user: full or abbreviated, at least 4 hex chars.
///
/// Matching is prefix equivalence in either direction, so an abbreviated key
/// matches every full hash that starts with it, while a full-length key only
/// matches the exact commit.
///
/// # Example
///
/// ```
/// use uplift_unroll::core::types::{CommitPrefix, Oid};
///
/// let full = Oid::new("0123456789abcdef0123456789abcdef01234567").unwrap();
/// let other = Oid::new("01234567ffffffffffffffffffffffffffffffff").unwrap();
///
/// let short = CommitPrefix::new("01234567").unwrap();
/// assert!(short.matches(&full));
/// assert!(short.matches(&other));
///
/// let exact = CommitPrefix::new(full.as_str()).unwrap();
/// assert!(exact.matches(&full));
/// assert!(!exact.matches(&other));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitPrefix(String);

impl CommitPrefix {
    const MIN_LEN: usize = 4;

    /// Create a validated commit prefix (normalized to lowercase).
    pub fn new(prefix: impl Into<String>) -> Result<Self, TypeError> {
        let prefix = prefix.into().trim().to_ascii_lowercase();
        if prefix.len() < Self::MIN_LEN || prefix.len() > 64 {
            return Err(TypeError::InvalidPrefix(format!(
                "'{prefix}' must be between {} and 64 characters",
                Self::MIN_LEN
            )));
        }
        if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidPrefix(format!(
                "'{prefix}' is not hexadecimal"
            )));
        }
        Ok(Self(prefix))
    }

    /// Check whether this key designates `oid`.
    pub fn matches(&self, oid: &Oid) -> bool {
        oid.as_str().starts_with(&self.0) || self.0.starts_with(oid.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CommitPrefix {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CommitPrefix> for String {
    fn from(prefix: CommitPrefix) -> Self {
        prefix.0
    }
}

impl std::fmt::Display for CommitPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_branch_names() {
            assert!(BranchName::new("main").is_ok());
            assert!(BranchName::new("uplift/flattened").is_ok());
            assert!(BranchName::new("jzx/uplift_tree").is_ok());
            assert!(BranchName::new("with.dot").is_ok());
        }

        #[test]
        fn invalid_branch_names() {
            assert!(BranchName::new("").is_err());
            assert!(BranchName::new("@").is_err());
            assert!(BranchName::new("-flag").is_err());
            assert!(BranchName::new(".hidden").is_err());
            assert!(BranchName::new("foo/.hidden").is_err());
            assert!(BranchName::new("branch.lock").is_err());
            assert!(BranchName::new("branch/").is_err());
            assert!(BranchName::new("bad..path").is_err());
            assert!(BranchName::new("foo//bar").is_err());
            assert!(BranchName::new("main^").is_err());
        }

        #[test]
        fn refname() {
            let name = BranchName::new("uplift/flattened").unwrap();
            assert_eq!(name.refname(), "refs/heads/uplift/flattened");
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn sha1_and_sha256_lengths() {
            assert!(Oid::new("a".repeat(40)).is_ok());
            assert!(Oid::new("a".repeat(64)).is_ok());
            assert!(Oid::new("a".repeat(8)).is_err());
        }

        #[test]
        fn normalizes_case() {
            let oid = Oid::new("ABCDEF".repeat(6) + "ABCD").unwrap();
            assert!(oid.as_str().chars().all(|c| !c.is_ascii_uppercase()));
        }

        #[test]
        fn short_clamps_to_length() {
            let oid = Oid::new("b".repeat(40)).unwrap();
            assert_eq!(oid.short(100).len(), 40);
        }
    }

    mod commit_prefix {
        use super::*;

        fn oid(s: &str) -> Oid {
            Oid::new(s).unwrap()
        }

        #[test]
        fn too_short_rejected() {
            assert!(CommitPrefix::new("abc").is_err());
        }

        #[test]
        fn non_hex_rejected() {
            assert!(CommitPrefix::new("xyz12345").is_err());
        }

        #[test]
        fn eight_char_prefix_matches_all_sharing_it() {
            let key = CommitPrefix::new("deadbeef").unwrap();
            assert!(key.matches(&oid(&format!("deadbeef{}", "0".repeat(32)))));
            assert!(key.matches(&oid(&format!("deadbeef{}", "1".repeat(32)))));
            assert!(!key.matches(&oid(&format!("deadbeee{}", "0".repeat(32)))));
        }

        #[test]
        fn full_key_matches_only_exact() {
            let a = oid(&format!("deadbeef{}", "0".repeat(32)));
            let b = oid(&format!("deadbeef{}", "1".repeat(32)));
            let key = CommitPrefix::new(a.as_str()).unwrap();
            assert!(key.matches(&a));
            assert!(!key.matches(&b));
        }

        #[test]
        fn uppercase_key_normalized() {
            let key = CommitPrefix::new("DEADBEEF").unwrap();
            assert_eq!(key.as_str(), "deadbeef");
        }
    }
}
