//! Relative-path value type with case-policy-aware ordering and equality.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Whether names are compared case-insensitively (Windows-like filesystems)
/// or case-sensitively (POSIX-like filesystems). Fixed per root at boot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum CasePolicy {
    CaseSensitive,
    CaseInsensitive,
}

impl CasePolicy {
    /// The policy a typical native filesystem on the running platform uses.
    #[cfg(target_os = "windows")]
    pub fn native() -> Self {
        CasePolicy::CaseInsensitive
    }

    #[cfg(not(target_os = "windows"))]
    pub fn native() -> Self {
        CasePolicy::CaseSensitive
    }

    fn normalize<'a>(&self, s: &'a str) -> std::borrow::Cow<'a, str> {
        match self {
            CasePolicy::CaseSensitive => std::borrow::Cow::Borrowed(s),
            CasePolicy::CaseInsensitive => std::borrow::Cow::Owned(s.to_lowercase()),
        }
    }

    pub fn eq(&self, a: &str, b: &str) -> bool {
        match self {
            CasePolicy::CaseSensitive => a == b,
            CasePolicy::CaseInsensitive => a.eq_ignore_ascii_case(b) || self.normalize(a) == self.normalize(b),
        }
    }

    pub fn cmp(&self, a: &str, b: &str) -> Ordering {
        match self {
            CasePolicy::CaseSensitive => a.cmp(b),
            CasePolicy::CaseInsensitive => self.normalize(a).cmp(&self.normalize(b)),
        }
    }
}

/// A path relative to a base root, expressed as an ordered sequence of
/// components. Never contains `.`/`..` or an absolute prefix; never empty
/// once constructed with at least one component.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct RelPath {
    components: Vec<String>,
}

impl RelPath {
    /// Build a RelPath from an already-split component list. Panics on an
    /// empty component or one containing a path separator, since the
    /// scanner (C3) is the only legitimate caller and never produces these.
    pub fn from_components(components: Vec<String>) -> Self {
        for c in &components {
            debug_assert!(!c.is_empty(), "RelPath component must not be empty");
            debug_assert!(
                !c.contains('/') && !c.contains('\\'),
                "RelPath component must not contain a path separator: {c}"
            );
        }
        Self { components }
    }

    /// Parse a `/`-separated relative path string.
    pub fn parse(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
            .collect();
        Self { components }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The final component, if any (the root path has none).
    pub fn leaf(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The path with its final component removed; `None` for the root.
    pub fn parent(&self) -> Option<RelPath> {
        if self.components.is_empty() {
            return None;
        }
        Some(RelPath {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Append a child component, returning a new RelPath.
    pub fn join(&self, child: &str) -> RelPath {
        let mut components = self.components.clone();
        components.push(child.to_owned());
        RelPath { components }
    }

    /// All strict ancestors, from the immediate parent up to the root,
    /// nearest first.
    pub fn ancestors(&self) -> Vec<RelPath> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(p) = cur {
            let next = p.parent();
            out.push(p);
            cur = next;
        }
        out
    }

    pub fn to_path_buf(&self) -> std::path::PathBuf {
        self.components.iter().collect()
    }

    pub fn display_string(&self) -> String {
        self.components.join("/")
    }

    pub fn compare(&self, other: &RelPath, policy: CasePolicy) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match policy.cmp(a, b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        self.components.len().cmp(&other.components.len())
    }

    pub fn equals(&self, other: &RelPath, policy: CasePolicy) -> bool {
        self.components.len() == other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| policy.eq(a, b))
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_string())
    }
}

/// Plain structural equality (byte-for-byte); case-policy equality must go
/// through [`RelPath::equals`]. Kept so RelPath can live in plain
/// `HashSet`/`BTreeMap` keys when exact identity (not policy-aware
/// collision) is what's wanted, e.g. as a map key after scanning one side.
impl PartialEq for RelPath {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl std::hash::Hash for RelPath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

/// Wrapper that orders/hashes/equates a RelPath under a given case policy,
/// for use as a map key during matching (C4), where collisions must follow
/// the policy rather than byte-exact comparison.
#[derive(Debug, Clone)]
pub struct PolicyKey {
    pub path: RelPath,
    pub policy: CasePolicy,
}

impl PolicyKey {
    pub fn new(path: RelPath, policy: CasePolicy) -> Self {
        Self { path, policy }
    }

    fn normalized(&self) -> Vec<String> {
        self.path
            .components()
            .iter()
            .map(|c| match self.policy {
                CasePolicy::CaseSensitive => c.clone(),
                CasePolicy::CaseInsensitive => c.to_lowercase(),
            })
            .collect()
    }
}

impl PartialEq for PolicyKey {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}
impl Eq for PolicyKey {}

impl std::hash::Hash for PolicyKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl Ord for PolicyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.compare(&other.path, self.policy)
    }
}
impl PartialOrd for PolicyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
