// Decoding of the status broadcast payload.
//
// Broadcasters send a contiguous UTF-16 buffer whose fields are separated by
// the literal two-character marker `\0` (backslash, zero) rather than real
// NUL bytes. The buffer belongs to the sending process for the duration of
// the message only, so callers copy it into a `StatusUpdate` before the
// window procedure returns.

use serde::{Deserialize, Serialize};

/// Field separator used by the broadcast format.
pub const TOKEN_SEPARATOR: &str = r"\0";

/// An owned, ordered sequence of status tokens decoded from one broadcast.
///
/// Token order is significant. A payload that never contains the separator
/// decodes to a single token; an empty payload decodes to a single empty
/// token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    tokens: Vec<String>,
}

impl StatusUpdate {
    /// Build an update from already-split tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Split decoded text on the separator marker.
    pub fn parse(text: &str) -> Self {
        Self {
            tokens: text.split(TOKEN_SEPARATOR).map(str::to_owned).collect(),
        }
    }

    /// Decode a UTF-16 buffer copied out of a copy-data message.
    ///
    /// The buffer is treated as NUL-terminated within its length; anything
    /// past the first NUL unit is sender slack and ignored. Invalid UTF-16 is
    /// replaced rather than rejected.
    pub fn from_wide(units: &[u16]) -> Self {
        let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
        Self::parse(&String::from_utf16_lossy(&units[..end]))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }
}

impl std::fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tokens.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn test_split_ordered_tokens() {
        let update = StatusUpdate::parse(r"A\0B\0C");
        assert_eq!(update.tokens(), &["A", "B", "C"]);
    }

    #[test]
    fn test_empty_payload_is_single_empty_token() {
        let update = StatusUpdate::parse("");
        assert_eq!(update.tokens(), &[""]);
    }

    #[test]
    fn test_unseparated_payload_is_single_token() {
        let update = StatusUpdate::parse("no markers here");
        assert_eq!(update.tokens(), &["no markers here"]);
    }

    #[test]
    fn test_from_wide_truncates_at_nul() {
        let mut units = wide(r"X\0Y");
        units.push(0);
        units.extend(wide("stale sender slack"));
        let update = StatusUpdate::from_wide(&units);
        assert_eq!(update.tokens(), &["X", "Y"]);
    }

    #[test]
    fn test_from_wide_empty_buffer() {
        let update = StatusUpdate::from_wide(&[]);
        assert_eq!(update.tokens(), &[""]);
    }

    #[test]
    fn test_from_wide_lossy_on_invalid_utf16() {
        // Lone high surrogate is replaced, not an error.
        let update = StatusUpdate::from_wide(&[0xD800, b'a' as u16]);
        assert_eq!(update.tokens().len(), 1);
        assert!(update.tokens()[0].ends_with('a'));
    }

    #[test]
    fn test_leading_separator_yields_leading_empty_token() {
        // Real broadcasts start with the marker, producing an empty first field.
        let update = StatusUpdate::parse(r"\0Music\01\0{0} - {1}");
        assert_eq!(update.tokens()[0], "");
        assert_eq!(update.tokens()[1], "Music");
    }

    #[test]
    fn test_ordered_equality() {
        let a = StatusUpdate::from_tokens(["A", "B"]);
        let b = StatusUpdate::parse(r"A\0B");
        let c = StatusUpdate::from_tokens(["B", "A"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
