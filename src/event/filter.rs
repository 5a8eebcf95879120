use std::collections::HashSet;

/// Allow-list of CloudTrail event names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNameFilter {
    names: HashSet<String>,
}

impl EventNameFilter {
    /// Returns `None` for an empty list: no names means no filtering.
    pub fn from_names<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            None
        } else {
            Some(Self { names })
        }
    }

    pub fn allows(&self, event_name: &str) -> bool {
        self.names.contains(event_name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
