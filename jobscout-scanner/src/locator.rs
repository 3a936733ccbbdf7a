use crate::error::{Result, ScanError};
use crate::prober::Fetch;
use crate::result::FetchedPage;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_CAREER_INDICATORS: &[&str] = &[
    "careers",
    "career",
    "jobs",
    "job",
    "work-with-us",
    "join-us",
    "opportunities",
    "employment",
    "hiring",
    "vacancies",
    "positions",
];

pub const DEFAULT_CAREER_PATHS: &[&str] = &[
    "/careers",
    "/jobs",
    "/career",
    "/about/careers",
    "/join-us",
    "/work-with-us",
    "/job-opportunities",
];

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// A homepage link that looks like it leads to open positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareerLink {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CareerSource {
    Link(CareerLink),
    FallbackPath(String),
}

#[derive(Debug, Clone)]
pub struct CareerPage {
    pub source: CareerSource,
    pub page: FetchedPage,
}

impl CareerPage {
    pub fn url(&self) -> &str {
        &self.page.url
    }
}

#[derive(Debug, Clone)]
pub struct CareerLocator {
    indicators: Vec<String>,
    fallback_paths: Vec<String>,
}

impl CareerLocator {
    pub fn new() -> Self {
        Self {
            indicators: DEFAULT_CAREER_INDICATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback_paths: DEFAULT_CAREER_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_indicators(mut self, indicators: Vec<String>) -> Self {
        self.indicators = indicators
            .into_iter()
            .map(|i| i.trim().to_lowercase())
            .filter(|i| !i.is_empty())
            .collect();
        self
    }

    pub fn with_fallback_paths(mut self, paths: Vec<String>) -> Self {
        self.fallback_paths = paths
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn fallback_paths(&self) -> &[String] {
        &self.fallback_paths
    }

    /// First link in document order whose visible text or path mentions a
    /// career indicator. Links back to `base_url` itself are ignored.
    pub fn find_career_link(&self, html: &str, base_url: &str) -> Option<CareerLink> {
        let base = Url::parse(base_url).ok()?;
        let document = Html::parse_document(html);

        for element in document.select(&LINK_SELECTOR) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(resolved) = resolve_url(&base, href.trim()) else {
                continue;
            };
            if same_page(&resolved, &base) {
                continue;
            }

            let mut text = element.text().collect::<String>();
            if let Some(label) = element.value().attr("aria-label") {
                text.push(' ');
                text.push_str(label);
            }
            let text = collapse_whitespace(&text);

            if self.link_matches(&text, &resolved, &base) {
                debug!("Career link candidate: {} ({:?})", resolved, text);
                return Some(CareerLink {
                    url: resolved.to_string(),
                    text,
                });
            }
        }

        None
    }

    fn link_matches(&self, text: &str, url: &Url, base: &Url) -> bool {
        let text = text.to_lowercase();
        let mut haystacks = vec![text, url.path().to_lowercase()];
        if let Some(query) = url.query() {
            haystacks.push(query.to_lowercase());
        }
        // Off-site links count on their host too, e.g. careers.example.com
        if url.host_str() != base.host_str()
            && let Some(host) = url.host_str()
        {
            haystacks.push(host.to_lowercase());
        }

        self.indicators
            .iter()
            .any(|indicator| haystacks.iter().any(|h| h.contains(indicator.as_str())))
    }

    /// Finds a careers page for a site whose homepage has already been
    /// fetched. Tries the best homepage link first, then the fallback paths.
    /// `Ok(None)` means the site has no discoverable careers page.
    pub async fn locate<F: Fetch + ?Sized>(
        &self,
        fetcher: &F,
        homepage: &FetchedPage,
    ) -> Result<Option<CareerPage>> {
        if homepage.is_html()
            && let Some(link) = self.find_career_link(&homepage.body, &homepage.url)
        {
            match fetcher.fetch(&link.url).await {
                Ok(page) => {
                    info!("Career page found via link: {}", page.url);
                    return Ok(Some(CareerPage {
                        source: CareerSource::Link(link),
                        page,
                    }));
                }
                Err(e) if e.is_network() => {
                    debug!("Career link {} failed: {}", link.url, e);
                }
                Err(e) => return Err(e),
            }
        }

        let root = site_root(&homepage.url)?;
        for path in &self.fallback_paths {
            let candidate = root
                .join(path)
                .map_err(|e| ScanError::InvalidUrl(format!("{}{}: {}", root, path, e)))?;
            match fetcher.fetch(candidate.as_str()).await {
                Ok(page) => {
                    info!("Career page found via fallback path: {}", page.url);
                    return Ok(Some(CareerPage {
                        source: CareerSource::FallbackPath(path.clone()),
                        page,
                    }));
                }
                Err(e) if e.is_network() => {
                    debug!("Fallback {} failed: {}", candidate, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }
}

impl Default for CareerLocator {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let lowered = href.to_ascii_lowercase();
    if href.is_empty()
        || lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

fn same_page(url: &Url, base: &Url) -> bool {
    url.host_str() == base.host_str()
        && url.path().trim_end_matches('/') == base.path().trim_end_matches('/')
        && url.query() == base.query()
}

/// Scheme, host and port of `url` with an empty path.
fn site_root(url: &str) -> Result<Url> {
    let mut root = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    Ok(root)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
