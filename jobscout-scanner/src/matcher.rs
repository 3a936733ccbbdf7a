use crate::result::FetchedPage;
use scraper::{ElementRef, Html, Node};
use std::collections::BTreeSet;

pub const DEFAULT_JOB_KEYWORDS: &[&str] = &[
    "devops engineer",
    "senior devops engineer",
    "cloud engineer",
    "senior cloud engineer",
    "infrastructure engineer",
    "senior infrastructure engineer",
];

/// Elements whose text never renders as page copy.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that break the line when rendered. Text either side of one is
/// separated; text inside inline markup is joined as-is.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "dd", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "option", "p", "pre", "section", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Case-insensitive substring scan for a fixed set of job titles.
///
/// This is deliberately a containment test: "Senior DevOps Engineer" matches
/// both `devops engineer` and `senior devops engineer`, while "DevOps / SRE
/// Engineer" matches neither.
#[derive(Debug, Clone)]
pub struct JobMatcher {
    keywords: Vec<String>,
}

impl JobMatcher {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = normalize_text(keyword.as_ref());
            if !keyword.is_empty() && !normalized.contains(&keyword) {
                normalized.push(keyword);
            }
        }
        Self {
            keywords: normalized,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn match_text(&self, text: &str) -> BTreeSet<String> {
        let haystack = normalize_text(text);
        self.keywords
            .iter()
            .filter(|keyword| haystack.contains(keyword.as_str()))
            .cloned()
            .collect()
    }

    pub fn match_page(&self, page: &FetchedPage) -> BTreeSet<String> {
        if page.is_html() {
            self.match_text(&page_text(&page.body))
        } else {
            self.match_text(&page.body)
        }
    }
}

impl Default for JobMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_KEYWORDS)
    }
}

enum Piece<'a> {
    Element(ElementRef<'a>),
    Text(&'a str),
    Break,
}

/// Visible text of an HTML document. Inline markup inside a word does not
/// split it: `Dev<span>Ops</span>` reads as `DevOps`.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    let mut stack = vec![Piece::Element(document.root_element())];

    while let Some(piece) = stack.pop() {
        match piece {
            Piece::Text(t) => text.push_str(t),
            Piece::Break => text.push(' '),
            Piece::Element(element) => {
                if BLOCK_ELEMENTS.contains(&element.value().name()) {
                    text.push(' ');
                    stack.push(Piece::Break);
                }
                for child in element.children().rev() {
                    match child.value() {
                        Node::Text(t) => stack.push(Piece::Text(t)),
                        Node::Element(el) if !HIDDEN_ELEMENTS.contains(&el.name()) => {
                            if let Some(child) = ElementRef::wrap(child) {
                                stack.push(Piece::Element(child));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    text
}

/// Lowercase and collapse runs of whitespace to a single space.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(found: BTreeSet<String>) -> Vec<String> {
        found.into_iter().collect()
    }

    #[test]
    fn test_senior_title_matches_both_phrases() {
        let matcher = JobMatcher::default();
        let found = matcher.match_text("We are hiring a Senior DevOps Engineer in Leeds");
        assert!(found.contains("devops engineer"));
        assert!(found.contains("senior devops engineer"));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_whitespace_and_case_are_normalized() {
        let matcher = JobMatcher::new(["Cloud  Engineer"]);
        let found = matcher.match_text("CLOUD\n\t   ENGINEER (Remote)");
        assert_eq!(titles(found), vec!["cloud engineer"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let matcher = JobMatcher::default();
        assert!(matcher.match_text("Account Manager, Sales Executive").is_empty());
    }

    #[test]
    fn test_phrasing_variants_are_not_matched() {
        let matcher = JobMatcher::new(["devops engineer"]);
        assert!(matcher.match_text("DevOps / SRE Engineer").is_empty());
    }

    #[test]
    fn test_containment_over_matches() {
        let matcher = JobMatcher::new(["devops engineer"]);
        let found = matcher.match_text("Infrastructure Engineer II (Non-DevOps Engineer track)");
        assert_eq!(titles(found), vec!["devops engineer"]);
    }

    #[test]
    fn test_keywords_are_deduplicated() {
        let matcher = JobMatcher::new(["Cloud Engineer", "cloud engineer", "  ", "cloud   engineer"]);
        assert_eq!(matcher.keywords(), &["cloud engineer".to_string()]);
    }

    #[test]
    fn test_page_text_skips_scripts_and_styles() {
        let html = r#"<html><head><title>Careers</title>
            <style>.cloud-engineer { color: red }</style></head>
            <body><h1>Open roles</h1>
            <script>var role = "cloud engineer";</script>
            <ul><li>Platform</li><li>Engineer</li></ul>
            </body></html>"#;
        let text = page_text(html);
        assert!(text.contains("Open roles"));
        assert!(!text.contains("cloud engineer"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn test_page_text_joins_inline_markup() {
        let html = "<ul><li><a href='/1'>Dev<span>Ops</span> Engineer</a></li>\
                    <li>Site</li><li>Reliability</li></ul>";
        let text = normalize_text(&page_text(html));
        assert!(text.contains("devops engineer"));
        assert!(text.contains("site reliability"));
        assert_eq!(
            titles(JobMatcher::default().match_text(&page_text(html))),
            vec!["devops engineer"]
        );
    }

    #[test]
    fn test_page_text_separates_block_elements() {
        let text = normalize_text(&page_text("<div>Cloud</div>Engineer<p>Infra</p><br>Structure"));
        assert_eq!(text, "cloud engineer infra structure");
    }

    #[test]
    fn test_match_page_uses_visible_text() {
        let page = FetchedPage::new(
            "https://acme.com/careers".into(),
            "https://acme.com/careers".into(),
            "<ul><li><a href='/1'>Cloud Engineer</a></li><li>Designer</li></ul>".into(),
        );
        let found = JobMatcher::default().match_page(&page);
        assert_eq!(titles(found), vec!["cloud engineer"]);
    }

    #[test]
    fn test_match_page_plain_text_body() {
        let mut page = FetchedPage::new(
            "https://acme.com/jobs.txt".into(),
            "https://acme.com/jobs.txt".into(),
            "Infrastructure Engineer - London".into(),
        );
        page.content_type = Some("text/plain".into());
        let found = JobMatcher::default().match_page(&page);
        assert_eq!(titles(found), vec!["infrastructure engineer"]);
    }
}
