use std::cmp::Ordering;
use std::fmt;

/// A numeric event identifier, kept as the digit string found on the page
///
/// Equality is string equality. Ordering is numeric, so a
/// `BTreeSet<EventId>` yields `2, 9, 10` rather than `10, 2, 9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId(String);

impl EventId {
    /// Accepts a non-empty string made only of ASCII digits
    pub fn parse(value: &str) -> Option<Self> {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digits without leading zeros; `"0"` stays `"0"`
    fn significant(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() {
            &self.0[self.0.len() - 1..]
        } else {
            trimmed
        }
    }
}

impl Ord for EventId {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant(), other.significant());
        // Fewer significant digits is a smaller number; equal lengths compare
        // digit by digit. The raw string breaks ties so Ord agrees with Eq.
        a.len()
            .cmp(&b.len())
            .then_with(|| a.cmp(b))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for EventId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
