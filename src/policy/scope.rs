//! Scope classifier: wildcard, broad-root, and surface classification of path prefixes.

use std::collections::BTreeSet;

/// Static scope policy literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePolicy {
    /// Roots that grant too much; compared after normalizing a trailing `/`.
    pub disallowed_broad_scopes: Vec<String>,
    /// Scope prefixes that make a tuple Beads-relevant.
    pub beads_scope_prefixes: Vec<String>,
    /// Authority id prefix that makes a tuple Beads-relevant.
    pub beads_authority_prefix: String,
    /// Ordered operational surfaces; the first matching prefix wins.
    pub surface_prefixes: Vec<String>,
    /// Resolution notes for merged items must live under this prefix.
    pub canonical_artifacts_root: String,
}

/// Classification of one scope entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeClass {
    /// The scope contains the wildcard glyph.
    pub is_wildcard: bool,
    /// The scope is one of the disallowed broad roots.
    pub is_broad: bool,
    /// Surface prefix the scope falls under, if any.
    pub surface: Option<String>,
}

/// Wildcard glyph disallowed in Beads-scoped tuples.
pub const WILDCARD: char = '*';

impl ScopePolicy {
    /// Classify an already-trimmed scope prefix.
    #[must_use]
    pub fn classify(&self, scope: &str) -> ScopeClass {
        let normalized = if scope.ends_with('/') {
            scope.to_string()
        } else {
            format!("{scope}/")
        };
        ScopeClass {
            is_wildcard: scope.contains(WILDCARD),
            is_broad: self
                .disallowed_broad_scopes
                .iter()
                .any(|root| *root == normalized),
            surface: self.surface_for(scope).map(str::to_string),
        }
    }

    /// First surface prefix that `scope` starts with, compared un-normalized.
    #[must_use]
    pub fn surface_for(&self, scope: &str) -> Option<&str> {
        self.surface_prefixes
            .iter()
            .find(|prefix| scope.starts_with(prefix.as_str()))
            .map(String::as_str)
    }

    /// Beads relevance: authority id prefix OR any raw string scope entry under a Beads prefix.
    ///
    /// The OR is kept as a deliberate policy choice; a tuple whose id is unrelated but whose
    /// scope touches a Beads path is audited too.
    #[must_use]
    pub fn is_beads_relevant<'a, I>(&self, authority_id: Option<&str>, scopes: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        if authority_id.is_some_and(|id| id.starts_with(self.beads_authority_prefix.as_str())) {
            return true;
        }
        scopes.into_iter().any(|scope| {
            self.beads_scope_prefixes
                .iter()
                .any(|prefix| scope.starts_with(prefix.as_str()))
        })
    }

    /// True when the distinct surfaces touched span more than one surface.
    #[must_use]
    pub fn is_multi_surface(surfaces: &BTreeSet<String>) -> bool {
        surfaces.len() > 1
    }
}
