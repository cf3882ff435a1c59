//! Typed input boundary.
//!
//! Control inputs (authority registry, merge queue) and session artifacts arrive as loosely
//! shaped JSON. Each kind is validated once here into an explicit union of accepted shapes;
//! anything outside the union is quarantined and counted, never silently coerced.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

/// A JSON scalar that is expected to be a string but may not be.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// A JSON string.
    Text(String),
    /// Any other JSON value.
    Other(Value),
}

impl Scalar {
    /// The string, when the value is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Other(_) => None,
        }
    }

    /// Display form used for identifiers: strings verbatim, other JSON compactly.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Other(v) => v.to_string(),
        }
    }
}

/// Outcome of reading one control input file.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Parsed document.
    Loaded(Value),
    /// The file does not exist.
    Missing,
    /// The file exists but is not valid JSON.
    InvalidJson(String),
    /// The file could not be read.
    ReadError(String),
}

impl LoadOutcome {
    /// The `input_warnings` entry for a failed load, `None` when loaded.
    #[must_use]
    pub fn warning(&self, display_path: &str) -> Option<String> {
        match self {
            Self::Loaded(_) => None,
            Self::Missing => Some(format!("missing: {display_path}")),
            Self::InvalidJson(e) => Some(format!("invalid_json: {display_path} ({e})")),
            Self::ReadError(e) => Some(format!("read_error: {display_path} ({e})")),
        }
    }
}

/// Read and parse a JSON file without failing the run.
pub fn load_json(path: &Path) -> LoadOutcome {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(e) => return LoadOutcome::ReadError(e.to_string()),
    };
    match serde_json::from_str(&raw) {
        Ok(value) => LoadOutcome::Loaded(value),
        Err(e) => LoadOutcome::InvalidJson(e.to_string()),
    }
}

/// Top-level shape violations of a control input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError(pub String);

impl ShapeError {
    /// The `input_warnings` entry for this violation.
    #[must_use]
    pub fn warning(&self, display_path: &str) -> String {
        format!("invalid_shape: {display_path} ({})", self.0)
    }
}

/// The `scope` field of an authority tuple.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScopeField {
    /// An array of entries.
    List(Vec<ScopeEntry>),
    /// Anything else; the tuple is reported as malformed.
    Other(Value),
}

impl Default for ScopeField {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// One scope entry; only strings are valid prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScopeEntry {
    /// A string prefix.
    Prefix(String),
    /// Anything else; reported as an invalid entry.
    Other(Value),
}

/// A declared grant of write authority over path prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorityTuple {
    /// Tuple identifier; usually a string.
    #[serde(default)]
    pub authority_id: Option<Scalar>,
    /// Path prefixes the tuple may write.
    #[serde(default)]
    pub scope: ScopeField,
}

impl AuthorityTuple {
    /// Raw string scope entries, for relevance tests.
    pub fn raw_prefixes(&self) -> impl Iterator<Item = &str> {
        let entries: &[ScopeEntry] = match &self.scope {
            ScopeField::List(entries) => entries,
            ScopeField::Other(_) => &[],
        };
        entries.iter().filter_map(|e| match e {
            ScopeEntry::Prefix(s) => Some(s.as_str()),
            ScopeEntry::Other(_) => None,
        })
    }
}

/// Parsed authority registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    /// Tuples that parsed as objects.
    pub tuples: Vec<AuthorityTuple>,
    /// Entries of `authority_tuples` that were not JSON objects.
    pub malformed_entries: usize,
}

/// One merge queue item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MergeQueueItem {
    /// Queue item identifier.
    #[serde(default)]
    pub merge_id: Option<Scalar>,
    /// Lifecycle status, compared case-insensitively.
    #[serde(default)]
    pub status: Option<Scalar>,
    /// Reference to the resolution note of a merged item.
    #[serde(default)]
    pub resolution_note_ref: Option<Scalar>,
}

impl MergeQueueItem {
    /// Status with whitespace trimmed and case folded; a missing status is empty.
    #[must_use]
    pub fn normalized_status(&self) -> String {
        self.status
            .as_ref()
            .map(|s| s.render().trim().to_lowercase())
            .unwrap_or_default()
    }
}

/// A queue item with its 0-based position among all `items` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedItem {
    /// Position among all `items` entries, including malformed ones.
    pub position: usize,
    /// The parsed item.
    pub item: MergeQueueItem,
}

/// Parsed merge queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeQueue {
    /// Items that parsed as objects.
    pub items: Vec<IndexedItem>,
    /// Entries of `items` that were not JSON objects.
    pub malformed_entries: usize,
}

/// Validate the registry document shape.
pub fn parse_registry(value: &Value) -> Result<Registry, ShapeError> {
    let entries = object_array(value, "authority_tuples")?;
    let mut registry = Registry::default();
    for entry in entries {
        match entry
            .is_object()
            .then(|| AuthorityTuple::deserialize(entry).ok())
            .flatten()
        {
            Some(tuple) => registry.tuples.push(tuple),
            None => registry.malformed_entries += 1,
        }
    }
    Ok(registry)
}

/// Validate the merge queue document shape.
pub fn parse_merge_queue(value: &Value) -> Result<MergeQueue, ShapeError> {
    let entries = object_array(value, "items")?;
    let mut queue = MergeQueue::default();
    for (position, entry) in entries.iter().enumerate() {
        match entry
            .is_object()
            .then(|| MergeQueueItem::deserialize(entry).ok())
            .flatten()
        {
            Some(item) => queue.items.push(IndexedItem { position, item }),
            None => queue.malformed_entries += 1,
        }
    }
    Ok(queue)
}

/// The array at `key` of a top-level object; an absent key is an empty array.
fn object_array<'a>(value: &'a Value, key: &str) -> Result<&'a [Value], ShapeError> {
    let Value::Object(map) = value else {
        return Err(ShapeError("top level must be a JSON object".to_string()));
    };
    match map.get(key) {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ShapeError(format!("`{key}` must be an array"))),
    }
}

/// A list of strings where non-string members are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringList(pub Vec<String>);

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(|v| Self::from_value(&v))
    }
}

impl StringList {
    /// Keep the string members of an array; any other value is empty.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self(match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        })
    }

    /// True when any member is non-blank.
    #[must_use]
    pub fn any_non_blank(&self) -> bool {
        self.0.iter().any(|s| !s.trim().is_empty())
    }
}

/// Session summary: a flat string (legacy) or a nested object (current).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryField {
    /// Legacy plain-text summary.
    Flat(String),
    /// Current `{high_level, key_decisions}` object.
    Nested {
        /// Descriptive text.
        high_level: Option<String>,
        /// Decisions recorded inside the summary.
        key_decisions: StringList,
    },
    /// Any other JSON value.
    Other(Value),
}

impl<'de> Deserialize<'de> for SummaryField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Self::Flat(s),
            Value::Object(map) => Self::Nested {
                high_level: map
                    .get("high_level")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                key_decisions: map
                    .get("key_decisions")
                    .map(StringList::from_value)
                    .unwrap_or_default(),
            },
            other => Self::Other(other),
        })
    }
}

impl SummaryField {
    /// Descriptive summary text, when present and non-blank.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        let text = match self {
            Self::Flat(s) => s.as_str(),
            Self::Nested { high_level, .. } => high_level.as_deref()?,
            Self::Other(_) => return None,
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Nested `links` block of current-form session artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinksBlock {
    /// `principle/...` links.
    pub principles: StringList,
    /// Pattern links.
    pub patterns_used: StringList,
}

/// Either form of the `links` field; only objects carry links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinksField {
    /// A links object.
    Block(LinksBlock),
    /// Any other JSON value; carries no links.
    Other(Value),
}

impl<'de> Deserialize<'de> for LinksField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(map) => {
                let list = |key: &str| map.get(key).map(StringList::from_value).unwrap_or_default();
                Self::Block(LinksBlock {
                    principles: list("principles"),
                    patterns_used: list("patterns_used"),
                })
            }
            other => Self::Other(other),
        })
    }
}

/// The fields of a session artifact the auditors and indexer read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionArtifact {
    /// Identifier written at commit time.
    pub id: Option<Scalar>,
    /// Identifier declared by newer artifacts; preferred over `id` when present.
    pub artifact_id: Option<Scalar>,
    /// Flat or nested summary.
    pub summary: Option<SummaryField>,
    /// Legacy top-level principle links.
    pub principle_links: StringList,
    /// Legacy top-level pattern links.
    pub pattern_links: StringList,
    /// Current nested links block.
    pub links: Option<LinksField>,
    /// Legacy top-level decisions.
    pub key_decisions: StringList,
    /// Follow-up steps.
    pub next_steps: StringList,
    /// Raw score; only integers are honored.
    pub resumption_score: Option<Value>,
    /// Explicit session date.
    pub session_date: Option<Scalar>,
}

impl SessionArtifact {
    /// Parse a session artifact; only JSON objects are accepted.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Self::deserialize(value).ok()
    }

    /// `artifact_id` when it is a non-empty string, else `id`.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        let declared = self
            .artifact_id
            .as_ref()
            .and_then(Scalar::as_text)
            .filter(|s| !s.is_empty());
        declared.or_else(|| self.id.as_ref().and_then(Scalar::as_text))
    }

    fn links_block(&self) -> Option<&LinksBlock> {
        match self.links.as_ref()? {
            LinksField::Block(block) => Some(block),
            LinksField::Other(_) => None,
        }
    }

    /// Declared principle references across both field variants.
    #[must_use]
    pub fn principle_refs(&self) -> Vec<&str> {
        let nested = self.links_block().map(|b| b.principles.0.as_slice()).unwrap_or(&[]);
        self.principle_links
            .0
            .iter()
            .chain(nested)
            .map(String::as_str)
            .collect()
    }

    /// Declared pattern references across both field variants.
    #[must_use]
    pub fn pattern_refs(&self) -> Vec<&str> {
        let nested = self
            .links_block()
            .map(|b| b.patterns_used.0.as_slice())
            .unwrap_or(&[]);
        self.pattern_links
            .0
            .iter()
            .chain(nested)
            .map(String::as_str)
            .collect()
    }

    /// Summary text from either summary form.
    #[must_use]
    pub fn summary_text(&self) -> Option<&str> {
        self.summary.as_ref().and_then(SummaryField::text)
    }

    /// Any non-blank decision or next step across legacy and nested variants.
    #[must_use]
    pub fn has_decision_or_step(&self) -> bool {
        let nested = matches!(
            &self.summary,
            Some(SummaryField::Nested { key_decisions, .. }) if key_decisions.any_non_blank()
        );
        nested || self.key_decisions.any_non_blank() || self.next_steps.any_non_blank()
    }

    /// Summary plus at least one decision or step.
    #[must_use]
    pub fn is_non_trivial(&self) -> bool {
        self.summary_text().is_some() && self.has_decision_or_step()
    }

    /// Integer resumption score; other JSON kinds are ignored.
    #[must_use]
    pub fn resumption_score(&self) -> Option<i64> {
        self.resumption_score.as_ref().and_then(Value::as_i64)
    }
}
