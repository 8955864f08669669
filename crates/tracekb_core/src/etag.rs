//! Entity tags (cache validators).
//!
//! Serialized forms accepted by [`EntityTag::parse`]:
//!
//! ```text
//! ab        bare opaque token (strong)
//! "ab"      quoted opaque token (strong)
//! W/ab      weak, bare
//! W/"ab"    weak, quoted (the `W/` prefix is case-insensitive)
//! ```
//!
//! Only the outermost `W/` marks weakness: in `w/"W/ab"` the payload is
//! `W/ab`. [`EntityTag`]'s `Display` always quotes the payload.

use crate::error::{CoreError, CoreResult};
use sha2::{Digest, Sha256};
use std::fmt;
use tracekb_storage::Graph;

/// How two entity tags are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Both tags must be strong and have equal payloads (`If-Match`).
    Strong,
    /// Payloads must be equal, weakness ignored (`If-None-Match`).
    Weak,
}

/// An entity tag: opaque payload plus weak flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTag {
    opaque: String,
    weak: bool,
}

impl EntityTag {
    /// Creates a strong tag.
    pub fn strong(opaque: impl Into<String>) -> Self {
        Self {
            opaque: opaque.into(),
            weak: false,
        }
    }

    /// Creates a weak tag.
    pub fn weak(opaque: impl Into<String>) -> Self {
        Self {
            opaque: opaque.into(),
            weak: true,
        }
    }

    /// Parses a serialized tag.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntityTag` for empty input or a quote that is opened
    /// but never closed.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let trimmed = text.trim();
        let (weak, rest) = match trimmed.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case("W/") => (true, &trimmed[2..]),
            _ => (false, trimmed),
        };

        let opaque = if let Some(inner) = rest.strip_prefix('"') {
            inner
                .strip_suffix('"')
                .ok_or_else(|| CoreError::InvalidEntityTag {
                    text: text.to_string(),
                })?
        } else {
            if rest.is_empty() || rest.contains('"') {
                return Err(CoreError::InvalidEntityTag {
                    text: text.to_string(),
                });
            }
            rest
        };

        Ok(Self {
            opaque: opaque.to_string(),
            weak,
        })
    }

    /// Computes the tag of a resource's committed statements.
    ///
    /// Equal graphs always produce equal tags.
    #[must_use]
    pub fn for_graph(graph: &Graph) -> Self {
        let mut hasher = Sha256::new();
        for triple in graph {
            hasher.update(triple.to_string().as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();
        let opaque = digest[..16].iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self::strong(opaque)
    }

    /// The opaque payload.
    #[must_use]
    pub fn opaque(&self) -> &str {
        &self.opaque
    }

    /// Returns true if the tag is weak.
    #[must_use]
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Compares two tags.
    #[must_use]
    pub fn matches(&self, other: &EntityTag, comparison: Comparison) -> bool {
        match comparison {
            Comparison::Strong => !self.weak && !other.weak && self.opaque == other.opaque,
            Comparison::Weak => self.opaque == other.opaque,
        }
    }

    /// Returns true if some candidate matches this tag.
    pub fn matches_any<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a EntityTag>,
        comparison: Comparison,
    ) -> bool {
        candidates
            .into_iter()
            .any(|candidate| self.matches(candidate, comparison))
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            f.write_str("W/")?;
        }
        write!(f, "\"{}\"", self.opaque)
    }
}

impl std::str::FromStr for EntityTag {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

/// A list of validators, as carried by `If-Match` / `If-None-Match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityTagSet {
    /// `*`: matches every current representation.
    Any,
    /// An explicit list.
    Tags(Vec<EntityTag>),
}

impl EntityTagSet {
    /// Parses a comma-separated list, or `*`.
    ///
    /// Commas inside quoted payloads belong to the payload.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntityTag` if any element is invalid.
    pub fn parse(text: &str) -> CoreResult<Self> {
        if text.trim() == "*" {
            return Ok(Self::Any);
        }

        let mut tags = Vec::new();
        let mut start = 0;
        let mut quoted = false;
        for (i, c) in text.char_indices() {
            match c {
                '"' => quoted = !quoted,
                ',' if !quoted => {
                    push_element(&text[start..i], &mut tags)?;
                    start = i + 1;
                }
                _ => {}
            }
        }
        push_element(&text[start..], &mut tags)?;

        if tags.is_empty() {
            return Err(CoreError::InvalidEntityTag {
                text: text.to_string(),
            });
        }
        Ok(Self::Tags(tags))
    }

    /// Returns true if `tag` matches some element of the set.
    #[must_use]
    pub fn matches(&self, tag: &EntityTag, comparison: Comparison) -> bool {
        match self {
            Self::Any => true,
            Self::Tags(tags) => tag.matches_any(tags, comparison),
        }
    }
}

fn push_element(element: &str, tags: &mut Vec<EntityTag>) -> CoreResult<()> {
    if !element.trim().is_empty() {
        tags.push(EntityTag::parse(element)?);
    }
    Ok(())
}
