//! Provenance records: which filter flagged how many additional pixels.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::class::MaskClass;

/// One filter invocation during a composition run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProvenanceEntry {
    /// Filter identifier.
    pub filter: String,
    /// Owning mask class.
    pub class: MaskClass,
    /// Pixels this filter set that were still valid before it ran.
    pub newly_flagged: usize,
    /// Pixels this filter flagged on its own, overlap included.
    pub flagged: usize,
}

/// Ordered audit trail of a composition run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProvenanceRecord {
    entries: Vec<ProvenanceEntry>,
}

impl ProvenanceRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: ProvenanceEntry) {
        self.entries.push(entry);
    }

    /// Entries in invocation order.
    #[must_use]
    pub fn entries(&self) -> &[ProvenanceEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProvenanceEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of newly flagged pixels; equals the composite's masked count.
    #[must_use]
    pub fn total_newly_flagged(&self) -> usize {
        self.entries.iter().map(|entry| entry.newly_flagged).sum()
    }

    /// Filter identifiers in invocation order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.filter.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a ProvenanceRecord {
    type Item = &'a ProvenanceEntry;
    type IntoIter = std::slice::Iter<'a, ProvenanceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
