//! Label-based field resolution over semi-structured HTML.
//!
//! A field is located by its human-readable label ("Posted Date",
//! "Agency Name", ...) and the value is read from an adjacent element.
//! Three patterns are tried per label, in order:
//!
//! 1. [`LabelPattern::SiblingElement`]: a heading/label-like element whose
//!    own text contains the label, followed (in document order) by a
//!    value-like element.
//! 2. [`LabelPattern::TableCell`]: a `td` whose text is exactly the label,
//!    optionally with a trailing colon, and its next sibling `td`.
//! 3. [`LabelPattern::MetaTag`]: a `<meta name=...>` containing the label.

use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Node, Selector};

pub const LABEL_TAGS: &[&str] = &["th", "dt", "label", "strong", "b", "span"];
pub const VALUE_TAGS: &[&str] = &["td", "dd", "span", "div", "p"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPattern {
    SiblingElement,
    TableCell,
    MetaTag,
}

pub const ALL_PATTERNS: &[LabelPattern] = &[
    LabelPattern::SiblingElement,
    LabelPattern::TableCell,
    LabelPattern::MetaTag,
];

/// Collapse whitespace runs (newlines and tabs included) to one space and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// Text of an element that has exactly one child, descending through
/// single-child wrappers (`<th><b>Title</b></th>` yields "Title").
fn own_string(el: ElementRef<'_>) -> Option<String> {
    let mut children = el.children();
    let only = children.next()?;
    if children.next().is_some() {
        return None;
    }
    match only.value() {
        Node::Text(text) => Some(text.to_string()),
        Node::Element(_) => ElementRef::wrap(only).and_then(own_string),
        _ => None,
    }
}

fn label_regex(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

pub struct LabelResolver<'a> {
    elements: Vec<ElementRef<'a>>,
    label_tags: &'a [&'a str],
    patterns: &'a [LabelPattern],
}

impl<'a> LabelResolver<'a> {
    pub fn new(document: &'a Html) -> Self {
        Self {
            elements: document
                .root_element()
                .descendants()
                .filter_map(ElementRef::wrap)
                .collect(),
            label_tags: LABEL_TAGS,
            patterns: ALL_PATTERNS,
        }
    }

    pub fn with_label_tags(mut self, tags: &'a [&'a str]) -> Self {
        self.label_tags = tags;
        self
    }

    pub fn with_patterns(mut self, patterns: &'a [LabelPattern]) -> Self {
        self.patterns = patterns;
        self
    }

    /// First value found for the most specific label that resolves.
    pub fn resolve(&self, labels: &[&str]) -> Option<String> {
        labels.iter().find_map(|label| {
            self.patterns.iter().find_map(|pattern| match pattern {
                LabelPattern::SiblingElement => self.sibling_element(label),
                LabelPattern::TableCell => self.table_cell(label),
                LabelPattern::MetaTag => self.meta_tag(label),
            })
        })
    }

    fn sibling_element(&self, label: &str) -> Option<String> {
        let re = label_regex(&regex::escape(label))?;
        let position = self.elements.iter().position(|el| {
            self.label_tags.contains(&el.value().name())
                && own_string(*el).is_some_and(|s| re.is_match(&s))
        })?;

        let value = self.elements[position + 1..]
            .iter()
            .find(|el| VALUE_TAGS.contains(&el.value().name()))?;
        let text = element_text(*value);
        if text.is_empty() || text.to_lowercase() == label.to_lowercase() {
            return None;
        }
        Some(text)
    }

    fn table_cell(&self, label: &str) -> Option<String> {
        let re = label_regex(&format!(r"^\s*{}\s*:?\s*$", regex::escape(label)))?;
        self.elements
            .iter()
            .filter(|el| el.value().name() == "td")
            .filter(|el| own_string(**el).is_some_and(|s| re.is_match(&s)))
            .find_map(|td| {
                let next = td
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|sib| sib.value().name() == "td")?;
                Some(element_text(next)).filter(|t| !t.is_empty())
            })
    }

    fn meta_tag(&self, label: &str) -> Option<String> {
        let re = label_regex(&regex::escape(label))?;
        let meta = self.elements.iter().find(|el| {
            el.value().name() == "meta" && el.value().attr("name").is_some_and(|n| re.is_match(n))
        })?;
        meta.value()
            .attr("content")
            .map(clean_text)
            .filter(|t| !t.is_empty())
    }
}

/// First text of `selector` that survives the boilerplate filter.
pub fn heading_text(document: &Html, selector: &str, boilerplate: &[&str]) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let text = element_text(document.select(&sel).next()?);
    let lower = text.to_lowercase();
    if text.is_empty() || boilerplate.iter().any(|b| lower.contains(b)) {
        return None;
    }
    Some(text)
}

/// Text of the first `div` whose id or class mentions one of `keywords`.
pub fn container_text(document: &Html, keywords: &[&str]) -> Option<String> {
    let sel = Selector::parse("div").ok()?;
    document
        .select(&sel)
        .find(|div| {
            let id = div.value().id().unwrap_or_default();
            let class = div.value().classes().collect::<Vec<_>>().join(" ");
            let haystack = format!("{id} {class}").to_lowercase();
            keywords.iter().any(|k| haystack.contains(k))
        })
        .map(element_text)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><head></head><body>{body}</body></html>"))
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a\n\t b   c \r\n"), "a b c");
        assert_eq!(clean_text(" \n "), "");
    }

    #[test]
    fn sibling_element_reads_next_value_tag() {
        let d = doc("<dl><dt>Posted Date:</dt><dd> Jan 5, 2024 </dd></dl>");
        let resolver = LabelResolver::new(&d);
        assert_eq!(resolver.resolve(&["Posted Date"]).as_deref(), Some("Jan 5, 2024"));
    }

    #[test]
    fn sibling_element_is_case_insensitive_and_descends_wrappers() {
        let d = doc("<table><tr><th><b>AGENCY NAME</b></th><td>Department of Energy</td></tr></table>");
        let resolver = LabelResolver::new(&d);
        assert_eq!(
            resolver.resolve(&["Agency Name"]).as_deref(),
            Some("Department of Energy")
        );
    }

    #[test]
    fn sibling_value_repeating_the_label_is_rejected() {
        let d = doc("<strong>Eligibility</strong><span>eligibility</span>");
        let resolver = LabelResolver::new(&d);
        assert_eq!(resolver.resolve(&["Eligibility"]), None);
    }

    #[test]
    fn table_cell_accepts_trailing_colon() {
        let d = doc("<table><tr><td>Award Floor :</td><td>$10,000</td></tr></table>");
        let resolver = LabelResolver::new(&d);
        assert_eq!(resolver.resolve(&["Award Floor"]).as_deref(), Some("$10,000"));
    }

    #[test]
    fn table_cell_requires_whole_cell_match() {
        let d = doc("<table><tr><td>Original Award Floor Notes</td><td>n/a</td></tr></table>");
        let resolver = LabelResolver::new(&d).with_patterns(&[LabelPattern::TableCell]);
        assert_eq!(resolver.resolve(&["Award Floor"]), None);
    }

    #[test]
    fn table_cell_skips_empty_values_and_tries_later_cells() {
        let d = doc(
            "<table><tr><td>Close Date</td><td>  </td></tr>\
             <tr><td>Close Date:</td><td>06/01/2024</td></tr></table>",
        );
        let resolver = LabelResolver::new(&d);
        assert_eq!(resolver.resolve(&["Close Date"]).as_deref(), Some("06/01/2024"));
    }

    #[test]
    fn meta_tag_is_last_resort() {
        let d = Html::parse_document(
            r#"<html><head><meta name="dc.description" content="  Funds  pilot studies. "></head><body></body></html>"#,
        );
        let resolver = LabelResolver::new(&d);
        assert_eq!(
            resolver.resolve(&["Description"]).as_deref(),
            Some("Funds pilot studies.")
        );
        let without_meta = LabelResolver::new(&d)
            .with_patterns(&[LabelPattern::SiblingElement, LabelPattern::TableCell]);
        assert_eq!(without_meta.resolve(&["Description"]), None);
    }

    #[test]
    fn earlier_labels_win_over_later_ones() {
        let d = doc(
            "<table><tr><td>Title</td><td>Generic</td></tr>\
             <tr><td>Funding Opportunity Title</td><td>Specific</td></tr></table>",
        );
        let resolver = LabelResolver::new(&d);
        assert_eq!(
            resolver
                .resolve(&["Funding Opportunity Title", "Title"])
                .as_deref(),
            Some("Specific")
        );
    }

    #[test]
    fn missing_label_resolves_to_none() {
        let d = doc("<p>Nothing labelled here.</p>");
        let resolver = LabelResolver::new(&d);
        assert_eq!(resolver.resolve(&["Expected Number of Awards"]), None);
    }

    #[test]
    fn custom_label_tags_include_divs() {
        let d = doc("<div>Who May Submit</div><p>Universities only</p>");
        assert_eq!(LabelResolver::new(&d).resolve(&["Who May Submit"]), None);
        let with_div = LabelResolver::new(&d).with_label_tags(&["div"]);
        assert_eq!(
            with_div.resolve(&["Who May Submit"]).as_deref(),
            Some("Universities only")
        );
    }

    #[test]
    fn heading_text_filters_boilerplate() {
        let d = Html::parse_document(
            "<html><head><title>Grants.gov - View Grant</title></head><body><h1>Rural Clinics</h1></body></html>",
        );
        assert_eq!(heading_text(&d, "title", &["grants.gov"]), None);
        assert_eq!(
            heading_text(&d, "h1", &["grants.gov"]).as_deref(),
            Some("Rural Clinics")
        );
    }

    #[test]
    fn container_text_matches_id_or_class() {
        let d = doc(r#"<div id="nav">menu</div><div class="Program-Synopsis"> Builds   capacity. </div>"#);
        assert_eq!(
            container_text(&d, &["synopsis"]).as_deref(),
            Some("Builds capacity.")
        );
        assert_eq!(container_text(&d, &["abstract"]), None);
    }
}
