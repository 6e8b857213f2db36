//! Fixed and masked byte-pattern search.

use std::fmt;

/// A byte pattern where `None` matches any byte.
#[derive(Clone, PartialEq, Eq)]
pub struct BytePattern {
    bytes: Vec<Option<u8>>,
}

impl BytePattern {
    /// Pattern from explicit bytes and wildcards.
    pub fn new(bytes: Vec<Option<u8>>) -> Self {
        Self { bytes }
    }

    /// Pattern matching `bytes` exactly.
    pub fn exact(bytes: &[u8]) -> Self {
        Self::new(bytes.iter().copied().map(Some).collect())
    }

    /// Parse a hex pattern such as `"8F ?? 5D"`.
    ///
    /// Returns `None` if a token is neither a hex byte nor `??`.
    pub fn parse(text: &str) -> Option<Self> {
        text.split_whitespace()
            .map(|tok| match tok {
                "??" => Some(None),
                hex => u8::from_str_radix(hex, 16).ok().map(Some),
            })
            .collect::<Option<Vec<_>>>()
            .filter(|b| !b.is_empty())
            .map(Self::new)
    }

    /// Pattern length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for the empty pattern.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns `true` if the pattern matches at the start of `window`.
    pub fn matches_at(&self, window: &[u8]) -> bool {
        window.len() >= self.bytes.len()
            && self
                .bytes
                .iter()
                .zip(window)
                .all(|(p, &b)| p.map_or(true, |p| p == b))
    }

    /// First match at or after `from`.
    pub fn find(&self, haystack: &[u8], from: usize) -> Option<usize> {
        if self.is_empty() || haystack.len() < self.len() {
            return None;
        }
        (from..=haystack.len() - self.len()).find(|&i| self.matches_at(&haystack[i..]))
    }

    /// Every match offset, overlapping matches included.
    pub fn find_all<'h>(&'h self, haystack: &'h [u8]) -> impl Iterator<Item = usize> + 'h {
        let mut next = 0;
        std::iter::from_fn(move || {
            let at = self.find(haystack, next)?;
            next = at + 1;
            Some(at)
        })
    }
}

impl fmt::Debug for BytePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .bytes
            .iter()
            .map(|b| b.map_or_else(|| "??".to_string(), |b| format!("{b:02X}")))
            .collect();
        write!(f, "BytePattern({})", tokens.join(" "))
    }
}
