use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Latest object timestamp seen per source.
///
/// Lives for one process run. Values only ever move forward: advancing to
/// an older timestamp is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermarks {
    by_source: HashMap<String, DateTime<Utc>>,
}

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &str) -> Option<DateTime<Utc>> {
        self.by_source.get(source).copied()
    }

    /// Returns true if the stored watermark moved.
    pub fn advance(&mut self, source: &str, ts: DateTime<Utc>) -> bool {
        match self.by_source.get_mut(source) {
            Some(current) if *current >= ts => false,
            Some(current) => {
                *current = ts;
                true
            }
            None => {
                self.by_source.insert(source.to_string(), ts);
                true
            }
        }
    }

    /// Advance every source present in `other`; returns how many moved.
    pub fn merge(&mut self, other: &Watermarks) -> usize {
        other
            .iter()
            .filter(|(source, ts)| self.advance(source, *ts))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DateTime<Utc>)> {
        self.by_source.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 3, h, 0, 0).unwrap()
    }

    #[test]
    fn test_advance_never_decreases() {
        let mut marks = Watermarks::new();
        assert!(marks.advance("a", at(2)));
        assert!(!marks.advance("a", at(1)));
        assert!(!marks.advance("a", at(2)));
        assert_eq!(marks.get("a"), Some(at(2)));

        assert!(marks.advance("a", at(3)));
        assert_eq!(marks.get("a"), Some(at(3)));
        assert_eq!(marks.get("b"), None);
    }

    #[test]
    fn test_merge() {
        let mut marks = Watermarks::new();
        marks.advance("a", at(5));
        marks.advance("b", at(1));

        let mut observed = Watermarks::new();
        observed.advance("a", at(4));
        observed.advance("b", at(2));
        observed.advance("c", at(3));

        assert_eq!(marks.merge(&observed), 2);
        assert_eq!(marks.get("a"), Some(at(5)));
        assert_eq!(marks.get("b"), Some(at(2)));
        assert_eq!(marks.get("c"), Some(at(3)));
        assert_eq!(marks.len(), 3);
    }
}
