//! Core domain model for funding opportunity announcements.

pub mod date;

use serde::{Deserialize, Serialize};

pub use date::{fuzzy_parse_available, normalize as normalize_date};

pub const CRATE_NAME: &str = "foa-core";

pub const UNKNOWN_TITLE: &str = "Unknown";

/// Column order used by flat/tabular exports.
pub const EXPORT_COLUMNS: [&str; 12] = [
    "foa_id",
    "title",
    "agency",
    "open_date",
    "close_date",
    "eligibility",
    "description",
    "source_url",
    "tags",
    "award_ceiling",
    "award_floor",
    "expected_awards",
];

/// Raw handoff contract from source adapters: every value exactly as the
/// label resolver found it, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpportunityDraft {
    pub foa_id: String,
    pub title: Option<String>,
    pub agency: Option<String>,
    pub open_date: Option<String>,
    pub close_date: Option<String>,
    pub eligibility: Option<String>,
    pub description: Option<String>,
    pub source_url: String,
    pub award_ceiling: Option<String>,
    pub award_floor: Option<String>,
    pub expected_awards: Option<String>,
}

/// Validated opportunity record.
///
/// Built once through [`FundingOpportunity::from_draft`]; afterwards only
/// [`FundingOpportunity::set_tags`] amends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingOpportunity {
    pub foa_id: String,
    pub title: String,
    pub agency: String,
    pub open_date: Option<String>,
    pub close_date: Option<String>,
    pub eligibility: String,
    pub description: String,
    pub source_url: String,
    pub tags: Vec<String>,
    pub award_ceiling: Option<String>,
    pub award_floor: Option<String>,
    pub expected_awards: Option<String>,
}

impl FundingOpportunity {
    pub fn from_draft(draft: OpportunityDraft) -> Self {
        let title = draft
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_TITLE)
            .to_string();

        Self {
            foa_id: draft.foa_id.trim().to_string(),
            title,
            agency: blank_to_empty(draft.agency),
            open_date: draft.open_date.as_deref().and_then(date::normalize),
            close_date: draft.close_date.as_deref().and_then(date::normalize),
            eligibility: blank_to_empty(draft.eligibility),
            description: blank_to_empty(draft.description),
            source_url: draft.source_url,
            tags: Vec::new(),
            award_ceiling: empty_to_none(draft.award_ceiling),
            award_floor: empty_to_none(draft.award_floor),
            expected_awards: empty_to_none(draft.expected_awards),
        }
    }

    /// Replace the tag list, keeping the first occurrence of each label.
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into();
            if !out.contains(&tag) {
                out.push(tag);
            }
        }
        self.tags = out;
    }

    /// Flat projection in [`EXPORT_COLUMNS`] order; tags joined with `"; "`.
    pub fn export_row(&self) -> Vec<(&'static str, String)> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let values = [
            self.foa_id.clone(),
            self.title.clone(),
            self.agency.clone(),
            opt(&self.open_date),
            opt(&self.close_date),
            self.eligibility.clone(),
            self.description.clone(),
            self.source_url.clone(),
            self.tags.join("; "),
            opt(&self.award_ceiling),
            opt(&self.award_floor),
            opt(&self.expected_awards),
        ];
        EXPORT_COLUMNS.into_iter().zip(values).collect()
    }
}

fn blank_to_empty(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => String::new(),
    }
}

fn empty_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
