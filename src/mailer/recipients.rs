//! Recipient lists typed in by the user.

use std::fmt;

/// A non-empty list of trimmed recipient addresses.
///
/// Addresses are free text here; syntax is checked by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// Parse a comma-separated list. Returns `None` when nothing is left
    /// after trimming.
    pub fn parse(input: &str) -> Option<Self> {
        let addresses: Vec<String> = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if addresses.is_empty() {
            None
        } else {
            Some(Self(addresses))
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Recipients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_list() {
        let recipients = Recipients::parse("a@x.com, b@x.com").unwrap();
        assert_eq!(recipients.as_slice(), ["a@x.com", "b@x.com"]);
        assert_eq!(recipients.len(), 2);
    }

    #[test]
    fn skips_blank_entries() {
        let recipients = Recipients::parse(" , a@x.com,,  ,b@x.com ,").unwrap();
        assert_eq!(recipients.iter().collect::<Vec<_>>(), vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn blank_input_is_rejected() {
        assert!(Recipients::parse("").is_none());
        assert!(Recipients::parse("   ").is_none());
        assert!(Recipients::parse(" , ,, ").is_none());
    }

    #[test]
    fn no_syntax_validation() {
        let recipients = Recipients::parse("not-an-address").unwrap();
        assert_eq!(recipients.to_string(), "not-an-address");
    }

    #[test]
    fn display_joins_with_comma() {
        let recipients = Recipients::parse("a@x.com,b@x.com").unwrap();
        assert_eq!(recipients.to_string(), "a@x.com, b@x.com");
    }
}
