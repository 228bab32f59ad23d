//! Canonical identity of a listed item

use serde::{Deserialize, Serialize};
use std::fmt;

/// Case-insensitive identity of an item: `owner/repo/item_id`, lowercased
///
/// This is the dedup key of the frontier and the primary key of every
/// downstream store. It is always computed from its components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Builds the identity from its components, trimming and lowercasing each
    ///
    /// # Example
    ///
    /// ```
    /// use skillscout::CanonicalId;
    ///
    /// let id = CanonicalId::new("Acme", " Tools", "Lint");
    /// assert_eq!(id.as_str(), "acme/tools/lint");
    /// ```
    pub fn new(owner: &str, repo: &str, item_id: &str) -> Self {
        Self(format!(
            "{}/{}/{}",
            owner.trim().to_lowercase(),
            repo.trim().to_lowercase(),
            item_id.trim().to_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `owner/repo` prefix of this identity
    pub fn repo_key(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Splits a listing `source` field such as `"Owner/Repo"` into a lowercased
/// `(owner, repo)` pair
///
/// Returns `None` when there are fewer than two segments or either part is
/// empty after trimming. Extra segments are ignored.
pub fn split_source(source: &str) -> Option<(String, String)> {
    let mut parts = source.split('/');
    let owner = parts.next()?.trim().to_lowercase();
    let repo = parts.next()?.trim().to_lowercase();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner, repo))
}

/// Joins an owner and repo into the `owner/repo` key used by repo sets
pub fn repo_key(owner: &str, repo: &str) -> String {
    format!("{}/{}", owner.trim().to_lowercase(), repo.trim().to_lowercase())
}
