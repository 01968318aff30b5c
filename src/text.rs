//! HTML-to-text normalization and boilerplate classification.
//!
//! `clean_html_text` is pure and total: whatever markup it is handed, it
//! degrades to best-effort plain text rather than failing.

use once_cell::sync::Lazy;
use regex::Regex;

/// Phrases that mark a sentence as non-article boilerplate (cross-references,
/// ad copy, compliance disclaimers). Matched case-insensitively.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "Read:",
    "Now read:",
    "See:",
    "And see:",
    "Read more:",
    "Check out:",
    "Related: ",
    "An expanded version of this",
    "Also:",
    "See now:",
    "Don't miss:",
    "See also:",
    "For more news:",
    "Full coverage at ",
    "Additional reporting by ",
    "Sign up for ",
    "This story has ",
    "contributed to this",
    "Read this:",
    "This report originally",
    "click on this",
    "you understand and agree that we",
    "Recommended:",
    "Related:",
    "Below is a snapshot of",
    ", go here.",
    "Full details at http",
];

/// Headlines matching these are earnings notifications, not articles.
pub const SALPHA_HEADLINE_DENYLIST: &[&str] = &[
    "on the hour",
    "beats on",
    " misses on revenue",
    "equity offering",
    "Notable earnings",
    " dividend",
    "leads after hour",
    "Gainers: ",
    " beats by ",
    " reports Q",
];

pub const SALPHA_BODY_DENYLIST: &[&str] = &[
    "Scorecard, Yield Chart",
    "click here",
    "Press Release",
    "ETFs:",
    "See all stocks",
    "now read:",
    "Shelf registration",
    "call starts at",
    "debt offering",
    "Forward yield",
    "for shareholders of record",
    " principal amount of",
];

static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<style[^>]*>.*?</style>").unwrap());
static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<script[^>]*>.*?</script>").unwrap());
static OPEN_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\w+[^<>]*>").unwrap());
static CLOSE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[\w-]+>").unwrap());
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!-*[^>]+>").unwrap());
static NUM_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#\w+;").unwrap());
static WS_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{3,}").unwrap());
static MERGED_PARA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])\s{2,}([A-Z])").unwrap());

/// Decode common HTML entities, strip style/script blocks, tags and comments,
/// collapse whitespace runs, and repair paragraphs the markup merged together.
pub fn clean_html_text(html: &str) -> String {
    let mut text = html
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&copy;", "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace('\u{2022}', "*")
        .replace('\u{25CF}', "* ")
        .replace('\r', "")
        .replace('\u{2014}', "-")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace('\u{2018}', "'")
        .replace('\u{2019}', "'")
        .replace('\u{201C}', "")
        .replace('\u{201D}', "");
    text = STYLE_BLOCK.replace_all(&text, "").into_owned();
    text = SCRIPT_BLOCK.replace_all(&text, "").into_owned();
    text = OPEN_TAG.replace_all(&text, "").into_owned();
    text = CLOSE_TAG.replace_all(&text, "").into_owned();
    text = COMMENT.replace_all(&text, "").into_owned();
    text = NUM_ENTITY.replace_all(&text, "").into_owned();
    text = WS_RUN.replace_all(&text, " ").into_owned();
    text = MERGED_PARA.replace_all(&text, "$1 $2").into_owned();
    text.trim().to_string()
}

/// Classifies sentences as boilerplate by length and denylisted phrases.
///
/// Denylists are immutable configuration supplied at construction; sources
/// with unusual markup (e.g. bullet-style bodies) get their own instance.
#[derive(Debug, Clone)]
pub struct BoilerplateFilter {
    min_len: usize,
    denylist: Vec<String>,
}

impl BoilerplateFilter {
    pub fn new(min_len: usize, denylist: &[String]) -> Self {
        Self {
            min_len,
            denylist: denylist.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Length-only filter, for denylists applied to headlines.
    pub fn headline(denylist: &[String]) -> Self {
        Self::new(0, denylist)
    }

    pub fn is_boilerplate(&self, text: &str) -> bool {
        if text.len() < self.min_len {
            return true;
        }
        let lower = text.to_lowercase();
        self.denylist.iter().any(|item| lower.contains(item))
    }
}

pub fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_filter() -> BoilerplateFilter {
        BoilerplateFilter::new(30, &to_owned_list(DEFAULT_DENYLIST))
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(
            clean_html_text("&ldquo;AAPL&rdquo; &amp; &lsquo;MSFT&rsquo;"),
            "\"AAPL\" & 'MSFT'"
        );
    }

    #[test]
    fn strips_tags_and_blocks() {
        let html = "<style type=\"text/css\">p { color: red; }</style>\
                    <script src=\"x.js\">var a = 1;</script>\
                    <p class=\"body\">Shares rose.</p><!-- promo -->";
        assert_eq!(clean_html_text(html), "Shares rose.");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(clean_html_text("a   b\n\n\nc"), "a b c");
    }

    #[test]
    fn repairs_merged_paragraphs() {
        // lowercase followed by >=2 spaces and an uppercase letter gets a
        // single separating space
        assert_eq!(clean_html_text("paragraph end  Next begins"), "paragraph end Next begins");
    }

    #[test]
    fn never_fails_on_garbage() {
        let out = clean_html_text("<<<>>>&#x1F600;<p");
        assert!(out.len() < 20);
    }

    #[test]
    fn short_text_is_boilerplate() {
        assert!(default_filter().is_boilerplate("Too short"));
    }

    #[test]
    fn denylisted_phrase_is_boilerplate_case_insensitive() {
        let f = default_filter();
        assert!(f.is_boilerplate("READ MORE: the full story behind the merger"));
        assert!(f.is_boilerplate("Sign up for our daily newsletter right here"));
    }

    #[test]
    fn ordinary_sentence_passes() {
        let f = default_filter();
        let text = "Apple shares climbed four percent today."; // 40 chars
        assert_eq!(text.len(), 40);
        assert!(!f.is_boilerplate(text));
    }

    #[test]
    fn headline_filter_ignores_length() {
        let f = BoilerplateFilter::headline(&to_owned_list(SALPHA_HEADLINE_DENYLIST));
        assert!(!f.is_boilerplate("Apple unveils new chip"));
        assert!(f.is_boilerplate("Apple beats by $0.10, beats on revenue"));
    }
}
