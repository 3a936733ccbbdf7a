use deunicode::deunicode;

/// TLDs tried in priority order.
pub const DEFAULT_TLDS: &[&str] = &[".co.uk", ".com", ".uk", ".io", ".net"];

pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// Trailing tokens that name a legal form rather than the business.
const LEGAL_SUFFIXES: &[&str] = &[
    "ltd",
    "limited",
    "inc",
    "incorporated",
    "llc",
    "llp",
    "plc",
    "corp",
    "corporation",
    "co",
    "company",
    "group",
    "holdings",
    "gmbh",
];

/// Derives candidate root URLs from a company name. No network access.
#[derive(Debug, Clone)]
pub struct DomainGuesser {
    tlds: Vec<String>,
    max_candidates: usize,
}

impl DomainGuesser {
    pub fn new() -> Self {
        Self {
            tlds: DEFAULT_TLDS.iter().map(|t| t.to_string()).collect(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    pub fn with_tlds(mut self, tlds: Vec<String>) -> Self {
        self.tlds = tlds
            .into_iter()
            .map(|t| {
                let t = t.trim().to_lowercase();
                if t.starts_with('.') { t } else { format!(".{}", t) }
            })
            .filter(|t| t.len() > 1)
            .collect();
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Ordered, deduplicated `https://host` candidates, earliest first.
    /// Empty when the name has no usable token.
    pub fn guess(&self, company: &str) -> Vec<String> {
        let tokens = company_tokens(company);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut variants = vec![tokens.concat()];
        if tokens.len() > 1 {
            variants.push(tokens.join("-"));
        }

        let mut candidates: Vec<String> = Vec::new();
        for tld in &self.tlds {
            for variant in &variants {
                let candidate = format!("https://{}{}", variant, tld);
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }

        candidates.truncate(self.max_candidates);
        candidates
    }
}

impl Default for DomainGuesser {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased ASCII alphanumeric tokens of a company name with trailing
/// legal-form suffixes removed. Accented letters are folded to ASCII first.
/// At least one token is always kept.
pub fn company_tokens(company: &str) -> Vec<String> {
    let cleaned: String = deunicode(company)
        .to_lowercase()
        .chars()
        .filter(|c| *c != '&' && *c != '\'' && *c != '\u{2019}')
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<String> = cleaned.split_whitespace().map(str::to_string).collect();

    while tokens.len() > 1
        && tokens
            .last()
            .is_some_and(|t| LEGAL_SUFFIXES.contains(&t.as_str()))
    {
        tokens.pop();
    }

    tokens
}
