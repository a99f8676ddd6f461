//! NSF award and program pages. Agency is fixed; an id is optional.

use async_trait::async_trait;
use foa_core::{FundingOpportunity, OpportunityDraft};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

use crate::label::{container_text, heading_text, LabelPattern, LabelResolver};
use crate::{ExtractError, SourceAdapter};

pub const NSF_AGENCY: &str = "National Science Foundation";
pub const UNKNOWN_AWARD_ID: &str = "NSF-UNKNOWN";

static AWD_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)AWD_ID=(\d+)").unwrap());
static LONG_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d{7,})(?:\?|$|#)").unwrap());

// NSF pages also label fields with bare `div`s.
const NSF_LABEL_TAGS: &[&str] = &["th", "dt", "label", "strong", "b", "span", "div"];
const NSF_PATTERNS: &[LabelPattern] = &[LabelPattern::SiblingElement, LabelPattern::TableCell];

const TITLE_LABELS: &[&str] = &["Title", "Award Title"];
const ABSTRACT_LABELS: &[&str] = &["Abstract", "Synopsis", "Program Synopsis"];
const START_DATE_LABELS: &[&str] = &["Start Date", "Effective Date", "Award Effective Date"];
const END_DATE_LABELS: &[&str] = &["End Date", "Expiration Date", "Award Expiration Date"];
const ELIGIBILITY_LABELS: &[&str] = &["Eligible", "Eligibility", "Who May Submit"];
const AMOUNT_LABELS: &[&str] = &["Award Amount", "Awarded Amount", "Estimated Total"];

const TITLE_BOILERPLATE: &[&str] = &["view grant", "search results"];
const ABSTRACT_CONTAINERS: &[&str] = &["abstract", "synopsis", "description"];

#[derive(Debug, Clone, Copy, Default)]
pub struct NsfAdapter;

#[async_trait]
impl SourceAdapter for NsfAdapter {
    fn source_id(&self) -> &'static str {
        "nsf"
    }

    fn resolve_identifier(&self, url: &str) -> Result<String, ExtractError> {
        let id = AWD_ID_RE
            .captures(url)
            .or_else(|| LONG_ID_RE.captures(url))
            .map(|caps| format!("NSF-{}", &caps[1]))
            .unwrap_or_else(|| UNKNOWN_AWARD_ID.to_string());
        Ok(id)
    }

    fn parse_html(&self, html: &str, url: &str, identifier: &str) -> FundingOpportunity {
        let document = Html::parse_document(html);
        let fields = LabelResolver::new(&document)
            .with_label_tags(NSF_LABEL_TAGS)
            .with_patterns(NSF_PATTERNS);

        let title = fields.resolve(TITLE_LABELS).or_else(|| {
            heading_text(&document, "h1", TITLE_BOILERPLATE)
                .or_else(|| heading_text(&document, "title", TITLE_BOILERPLATE))
        });
        let description = fields
            .resolve(ABSTRACT_LABELS)
            .or_else(|| container_text(&document, ABSTRACT_CONTAINERS));

        FundingOpportunity::from_draft(OpportunityDraft {
            foa_id: identifier.to_string(),
            title,
            agency: Some(NSF_AGENCY.to_string()),
            open_date: fields.resolve(START_DATE_LABELS),
            close_date: fields.resolve(END_DATE_LABELS),
            eligibility: fields.resolve(ELIGIBILITY_LABELS),
            description,
            source_url: url.to_string(),
            award_ceiling: fields.resolve(AMOUNT_LABELS),
            award_floor: None,
            expected_awards: None,
        })
    }
}
