//! Grants.gov opportunity detail pages.

use async_trait::async_trait;
use foa_core::{FundingOpportunity, OpportunityDraft};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

use crate::label::{container_text, heading_text, LabelResolver};
use crate::{ExtractError, SourceAdapter};

static TRAILING_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d+)(?:\?|$|#)").unwrap());
static OPP_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"oppId=(\d+)").unwrap());

const TITLE_LABELS: &[&str] = &["Funding Opportunity Title", "Opportunity Title", "Title"];
const AGENCY_LABELS: &[&str] = &["Agency Name", "Agency", "Department"];
const NUMBER_LABELS: &[&str] = &["Funding Opportunity Number", "Opportunity Number"];
const OPEN_DATE_LABELS: &[&str] = &["Posted Date", "Open Date", "Post Date"];
const CLOSE_DATE_LABELS: &[&str] = &[
    "Current Closing Date for Applications",
    "Close Date",
    "Closing Date",
    "Original Closing Date for Applications",
    "Application Deadline",
];
const ELIGIBILITY_LABELS: &[&str] = &["Eligible Applicants", "Eligibility"];
const DESCRIPTION_LABELS: &[&str] = &["Description", "Synopsis", "Opportunity Description"];
const AWARD_CEILING_LABELS: &[&str] = &["Award Ceiling", "Estimated Total Program Funding"];
const AWARD_FLOOR_LABELS: &[&str] = &["Award Floor"];
const EXPECTED_AWARDS_LABELS: &[&str] = &["Expected Number of Awards"];

const TITLE_BOILERPLATE: &[&str] = &["grants.gov", "search results", "view grant", "lock"];
const DESCRIPTION_CONTAINERS: &[&str] = &["synopsis", "description"];

#[derive(Debug, Clone, Copy, Default)]
pub struct GrantsGovAdapter;

#[async_trait]
impl SourceAdapter for GrantsGovAdapter {
    fn source_id(&self) -> &'static str {
        "grants-gov"
    }

    /// Numeric id from the path end, an `oppId` query parameter, or the last
    /// all-digit path segment.
    fn resolve_identifier(&self, url: &str) -> Result<String, ExtractError> {
        if let Some(caps) = TRAILING_ID_RE.captures(url) {
            return Ok(caps[1].to_string());
        }
        if let Some(caps) = OPP_ID_RE.captures(url) {
            return Ok(caps[1].to_string());
        }
        url.trim_end_matches('/')
            .rsplit('/')
            .find(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
            .map(ToString::to_string)
            .ok_or_else(|| ExtractError::IdentifierNotFound {
                url: url.to_string(),
            })
    }

    fn parse_html(&self, html: &str, url: &str, identifier: &str) -> FundingOpportunity {
        let document = Html::parse_document(html);
        let fields = LabelResolver::new(&document);

        let title = fields.resolve(TITLE_LABELS).or_else(|| {
            heading_text(&document, "title", TITLE_BOILERPLATE)
                .or_else(|| heading_text(&document, "h1", TITLE_BOILERPLATE))
        });
        let description = fields
            .resolve(DESCRIPTION_LABELS)
            .or_else(|| container_text(&document, DESCRIPTION_CONTAINERS));

        FundingOpportunity::from_draft(OpportunityDraft {
            foa_id: fields
                .resolve(NUMBER_LABELS)
                .unwrap_or_else(|| identifier.to_string()),
            title,
            agency: fields.resolve(AGENCY_LABELS),
            open_date: fields.resolve(OPEN_DATE_LABELS),
            close_date: fields.resolve(CLOSE_DATE_LABELS),
            eligibility: fields.resolve(ELIGIBILITY_LABELS),
            description,
            source_url: url.to_string(),
            award_ceiling: fields.resolve(AWARD_CEILING_LABELS),
            award_floor: fields.resolve(AWARD_FLOOR_LABELS),
            expected_awards: fields.resolve(EXPECTED_AWARDS_LABELS),
        })
    }
}
