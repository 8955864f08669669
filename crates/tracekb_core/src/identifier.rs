//! Resource identifiers.

use crate::error::{CoreError, CoreResult};
use std::borrow::Borrow;
use std::fmt;

/// An absolute IRI.
///
/// Construction checks the scheme and rejects characters that can never
/// appear in an IRI. No normalization is performed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Iri(String);

impl Iri {
    /// Validates and wraps an absolute IRI.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if `iri` has no scheme or contains
    /// whitespace, `<`, `>`, `"`, `{`, `}`, `|`, `\`, `^` or a backtick.
    pub fn new(iri: impl Into<String>) -> CoreResult<Self> {
        let iri = iri.into();
        if scheme_len(&iri).is_none() {
            return Err(CoreError::invalid_identifier(format!(
                "not an absolute IRI: {iri:?}"
            )));
        }
        if let Some(c) = iri
            .chars()
            .find(|c| c.is_whitespace() || "<>\"{}|\\^`".contains(*c))
        {
            return Err(CoreError::invalid_identifier(format!(
                "forbidden character {c:?} in {iri:?}"
            )));
        }
        Ok(Self(iri))
    }

    /// The IRI text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the IRI ends with `/`.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The IRI without query and fragment.
    #[must_use]
    pub fn without_fragment(&self) -> &str {
        let end = self.0.find(['?', '#']).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Iri {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<Iri> for String {
    fn from(iri: Iri) -> Self {
        iri.0
    }
}

impl std::str::FromStr for Iri {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::new(s)
    }
}

/// Anything that knows its own IRI.
pub trait HasUri {
    /// The holder's IRI.
    fn uri(&self) -> &Iri;
}

impl HasUri for Iri {
    fn uri(&self) -> &Iri {
        self
    }
}

/// A reference to a resource, in one of the forms callers hand around.
#[derive(Clone, Copy)]
pub enum Identifier<'a> {
    /// An absolute IRI.
    Absolute(&'a str),
    /// A reference relative to some base IRI.
    Relative(&'a str),
    /// An object that exposes its IRI.
    FromHolder(&'a dyn HasUri),
}

impl fmt::Debug for Identifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(s) => f.debug_tuple("Absolute").field(s).finish(),
            Self::Relative(s) => f.debug_tuple("Relative").field(s).finish(),
            Self::FromHolder(h) => f.debug_tuple("FromHolder").field(&h.uri().as_str()).finish(),
        }
    }
}

impl<'a> Identifier<'a> {
    /// Classifies a string as absolute or relative.
    #[must_use]
    pub fn parse(text: &'a str) -> Self {
        if scheme_len(text).is_some() {
            Self::Absolute(text)
        } else {
            Self::Relative(text)
        }
    }

    /// Resolves this identifier against `base`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if the result is not a valid IRI.
    pub fn resolve(&self, base: &Iri) -> CoreResult<Iri> {
        match self {
            Self::Absolute(iri) => Iri::new(*iri),
            Self::Relative(reference) => Iri::new(join(base.as_str(), reference)),
            Self::FromHolder(holder) => Ok(holder.uri().clone()),
        }
    }
}

impl<'a> From<&'a str> for Identifier<'a> {
    fn from(text: &'a str) -> Self {
        Self::parse(text)
    }
}

impl<'a> From<&'a Iri> for Identifier<'a> {
    fn from(iri: &'a Iri) -> Self {
        Self::FromHolder(iri)
    }
}

/// Length of the scheme (without `:`), if `text` starts with one.
fn scheme_len(text: &str) -> Option<usize> {
    let colon = text.find(':')?;
    let scheme = &text[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        Some(colon)
    } else {
        None
    }
}

/// Resolves `reference` against `base` (RFC 3986 §5.2, without queries
/// inheriting).
fn join(base: &str, reference: &str) -> String {
    let scheme_end = scheme_len(base).map_or(0, |n| n + 1);
    let after_scheme = &base[scheme_end..];
    let (authority, path_start) = match after_scheme.strip_prefix("//") {
        Some(rest) => {
            let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
            (&base[..scheme_end + 2 + end], scheme_end + 2 + end)
        }
        None => (&base[..scheme_end], scheme_end),
    };
    let base_path_end = base[path_start..]
        .find(['?', '#'])
        .map_or(base.len(), |i| path_start + i);
    let base_path = &base[path_start..base_path_end];

    if reference.is_empty() {
        return base[..base_path_end].to_string();
    }
    if reference.starts_with('#') || reference.starts_with('?') {
        return format!("{}{reference}", &base[..base_path_end]);
    }
    if reference.starts_with("//") {
        return format!("{}{reference}", &base[..scheme_end]);
    }

    let (ref_path, suffix) = split_suffix(reference);
    let merged = if ref_path.starts_with('/') {
        ref_path.to_string()
    } else {
        let dir = base_path.rfind('/').map_or("/", |i| &base_path[..=i]);
        format!("{dir}{ref_path}")
    };
    format!("{authority}{}{suffix}", remove_dot_segments(&merged))
}

fn split_suffix(reference: &str) -> (&str, &str) {
    let i = reference.find(['?', '#']).unwrap_or(reference.len());
    reference.split_at(i)
}

fn remove_dot_segments(path: &str) -> String {
    let mut output: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." => {
                if i == last {
                    output.push("");
                }
            }
            ".." => {
                if output.len() > 1 {
                    output.pop();
                }
                if i == last {
                    output.push("");
                }
            }
            s => output.push(s),
        }
    }
    let joined = output.join("/");
    if path.starts_with('/') && !joined.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Iri {
        Iri::new("http://host/base1/t1/").unwrap()
    }

    fn resolve(reference: &str) -> String {
        Identifier::parse(reference).resolve(&base()).unwrap().to_string()
    }

    #[test]
    fn validates_absolute_iris() {
        assert!(Iri::new("http://host/base1/").is_ok());
        assert!(Iri::new("urn:x-test:1").is_ok());
        assert!(Iri::new("relative/path").is_err());
        assert!(Iri::new("http://host/a b").is_err());
        assert!(Iri::new("1http://host/").is_err());
    }

    #[test]
    fn resolves_relative_references() {
        assert_eq!(resolve("obs1"), "http://host/base1/t1/obs1");
        assert_eq!(resolve("../m1"), "http://host/base1/m1");
        assert_eq!(resolve("./"), "http://host/base1/t1/");
        assert_eq!(resolve(".."), "http://host/base1/");
        assert_eq!(resolve("/other/"), "http://host/other/");
        assert_eq!(resolve("#frag"), "http://host/base1/t1/#frag");
        assert_eq!(resolve("//elsewhere/x"), "http://elsewhere/x");
        assert_eq!(resolve(""), "http://host/base1/t1/");
        assert_eq!(resolve("../../../../x"), "http://host/x");
    }

    #[test]
    fn absolute_reference_ignores_base() {
        assert_eq!(resolve("http://other/x"), "http://other/x");
    }

    #[test]
    fn holder_yields_its_own_iri() {
        let held = Iri::new("http://host/base2/").unwrap();
        let id = Identifier::from(&held);
        assert_eq!(id.resolve(&base()).unwrap(), held);
    }

    #[test]
    fn fragment_is_stripped_from_base() {
        let b = Iri::new("http://host/a/b#x").unwrap();
        assert_eq!(b.without_fragment(), "http://host/a/b");
        assert_eq!(
            Identifier::Relative("c").resolve(&b).unwrap().as_str(),
            "http://host/a/c"
        );
    }
}
