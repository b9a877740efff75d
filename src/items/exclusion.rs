//! Exclusion groups
//!
//! Cross-group mutual exclusion rules. Each catalog entry lists text patterns;
//! a modifier whose stat text matches one of them belongs to that group, and
//! two modifiers of the same group cannot sit on one item.
//!
//! Patterns are compiled once into segment matchers. Numeric text and
//! placeholders (`{}`, `{0}`, `#`, `3`, `(1-3)`, `2 to 5`) on either side are
//! interchangeable wildcards.

use serde::{Deserialize, Serialize};

use super::modifier::Modifier;

/// A catalog entry, loaded once and never mutated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionGroup {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub patterns: Vec<String>,
    /// Item categories this group applies to; empty means all
    #[serde(default)]
    pub applicable: Vec<String>,
}

impl ExclusionGroup {
    pub fn applies_to(&self, category: &str) -> bool {
        self.applicable.is_empty() || self.applicable.iter().any(|c| c.eq_ignore_ascii_case(category))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Lowercased literal text
    Literal(String),
    /// Any numeric value, range or placeholder
    Number,
}

/// Length in bytes of a single value at `pos`: `-?digits(.digits)?`, `{digits*}` or `#`
fn value_len(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut i = pos;
    match bytes.get(i)? {
        b'#' => return Some(1),
        b'{' => {
            i += 1;
            while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
                i += 1;
            }
            return (bytes.get(i) == Some(&b'}')).then(|| i + 1 - pos);
        }
        b'-' => i += 1,
        _ => {}
    }
    let digits_start = i;
    while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()) {
        i += 1;
        while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
            i += 1;
        }
    }
    Some(i - pos)
}

/// A value optionally followed by `-value` or ` to value`
fn range_len(bytes: &[u8], pos: usize) -> Option<usize> {
    let first = value_len(bytes, pos)?;
    let mut end = pos + first;
    for sep in [&b"-"[..], &b" to "[..]] {
        if bytes[end..].starts_with(sep) {
            if let Some(second) = value_len(bytes, end + sep.len()) {
                end += sep.len() + second;
                break;
            }
        }
    }
    Some(end - pos)
}

/// Length of a numeric token at `pos`, including an enclosing `( )`
fn numeric_token_len(bytes: &[u8], pos: usize) -> Option<usize> {
    if bytes.get(pos) == Some(&b'(') {
        if let Some(inner) = range_len(bytes, pos + 1) {
            if bytes.get(pos + 1 + inner) == Some(&b')') {
                return Some(inner + 2);
            }
        }
    }
    range_len(bytes, pos)
}

/// A compiled exclusion pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatcher {
    source: String,
    segments: Vec<Segment>,
}

impl PatternMatcher {
    pub fn compile(pattern: &str) -> Self {
        let source = pattern.trim().to_ascii_lowercase();
        let bytes = source.as_bytes();
        let mut segments = Vec::new();
        let mut literal_start = 0;
        let mut pos = 0;
        while pos < bytes.len() {
            match numeric_token_len(bytes, pos) {
                Some(len) => {
                    if literal_start < pos {
                        segments.push(Segment::Literal(source[literal_start..pos].to_string()));
                    }
                    segments.push(Segment::Number);
                    pos += len;
                    literal_start = pos;
                }
                None => pos += 1,
            }
        }
        if literal_start < bytes.len() {
            segments.push(Segment::Literal(source[literal_start..].to_string()));
        }
        Self { source, segments }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whole-text match, ASCII case-insensitive
    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim().to_ascii_lowercase();
        if text == self.source {
            return true;
        }
        let bytes = text.as_bytes();
        let mut pos = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    if !bytes[pos..].starts_with(lit.as_bytes()) {
                        return false;
                    }
                    pos += lit.len();
                }
                Segment::Number => match numeric_token_len(bytes, pos) {
                    Some(len) => pos += len,
                    None => return false,
                },
            }
        }
        pos == bytes.len()
    }
}

#[derive(Debug, Clone)]
struct CompiledGroup {
    group: ExclusionGroup,
    matchers: Vec<PatternMatcher>,
}

/// The exclusion catalog with every pattern precompiled
#[derive(Debug, Clone, Default)]
pub struct ExclusionCatalog {
    groups: Vec<CompiledGroup>,
}

impl ExclusionCatalog {
    pub fn new(groups: Vec<ExclusionGroup>) -> Self {
        let groups = groups
            .into_iter()
            .map(|group| CompiledGroup {
                matchers: group.patterns.iter().map(|p| PatternMatcher::compile(p)).collect(),
                group,
            })
            .collect();
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = &ExclusionGroup> {
        self.groups.iter().map(|g| &g.group)
    }

    /// First group applicable to `category` with a pattern matching the modifier
    pub fn group_for(&self, modifier: &Modifier, category: &str) -> Option<&str> {
        if modifier.is_unresolved() {
            return None;
        }
        let rendered = modifier.display_text();
        let candidates: Vec<&str> = std::iter::once(modifier.text.as_str())
            .chain(modifier.text.lines())
            .chain(std::iter::once(rendered.as_str()))
            .chain(rendered.lines())
            .collect();

        self.groups
            .iter()
            .filter(|g| g.group.applies_to(category))
            .find(|g| g.matchers.iter().any(|m| candidates.iter().any(|c| m.matches(c))))
            .map(|g| g.group.id.as_str())
    }

    /// Stamp each modifier with its exclusion group (or clear it)
    pub fn annotate(&self, modifiers: &mut [Modifier], category: &str) {
        for modifier in modifiers.iter_mut() {
            modifier.exclusion_group = self.group_for(modifier, category).map(str::to_string);
        }
    }
}
