//! Human-readable listings of the tracked members.

use crate::member::{MemberId, MemberRecord};
use std::collections::BTreeMap;
use std::fmt;

/// Which collection a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Active,
    Penalized,
}

impl ListKind {
    /// Line shown instead of an empty listing.
    pub fn empty_message(&self) -> &'static str {
        match self {
            ListKind::Active => "No new members are being tracked",
            ListKind::Penalized => "The penalty list is empty",
        }
    }
}

/// One line of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary<'a> {
    pub id: MemberId,
    pub record: &'a MemberRecord,
}

impl fmt::Display for MemberSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) joined on {}",
            self.record.display_name,
            self.record.handle.as_deref().unwrap_or("no handle"),
            self.record.joined_at.format("%Y-%m-%d")
        )
    }
}

/// Renders `records` oldest join first (ties broken by id), or the sentinel line when empty.
pub fn render_listing(kind: ListKind, records: &BTreeMap<MemberId, MemberRecord>) -> Vec<String> {
    if records.is_empty() {
        return vec![kind.empty_message().to_string()];
    }

    let mut summaries: Vec<MemberSummary<'_>> = records
        .iter()
        .map(|(id, record)| MemberSummary { id: *id, record })
        .collect();
    summaries.sort_by(|a, b| {
        a.record
            .joined_at
            .cmp(&b.record.joined_at)
            .then(a.id.cmp(&b.id))
    });

    summaries.iter().map(|s| s.to_string()).collect()
}
