//! MarketWatch adapter.
//!
//! The headline listing is a JSON endpoint keyed by a formatted local
//! timestamp, one day per page. Article bodies sit between the
//! `articleBody` and `author-commentPromo` markers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Candidate, Company, Story};
use crate::text::{clean_html_text, BoilerplateFilter};

use super::{
    default_client, fetch_company_meta, slice_between, Listing, PagingPolicy, SourceAdapter,
    PARAGRAPH_SEP,
};

pub const SOURCE: &str = "marketwatch";

static HEADLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)itemprop="headline">(.+?)</h1>"#).unwrap());
static PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<p>(.+?)</p>").unwrap());

pub struct MarketWatch {
    client: Client,
    filter: BoilerplateFilter,
}

impl MarketWatch {
    pub fn new(config: &Config) -> Self {
        Self {
            client: default_client(),
            filter: BoilerplateFilter::new(config.filters.min_len, &config.filters.denylist),
        }
    }
}

/// Listing timestamp format, e.g. `4:30+p.m.+Mar.+5,+2020`: 12-hour clock
/// with lowercased dotted meridiem and leading zeros stripped from the hour
/// and day.
fn format_page_date(date: DateTime<Utc>) -> String {
    let formatted = date
        .format("%I:%M+%p+%b.+%d,+%Y")
        .to_string()
        .replace("PM", "p.m.")
        .replace("AM", "a.m.");
    let mut parts: Vec<String> = formatted.split('+').map(|s| s.to_string()).collect();
    for idx in [0usize, 3] {
        if parts[idx].starts_with('0') {
            parts[idx].remove(0);
        }
    }
    parts.join("+")
}

#[async_trait]
impl SourceAdapter for MarketWatch {
    fn id(&self) -> &'static str {
        SOURCE
    }

    fn paging(&self) -> PagingPolicy {
        PagingPolicy {
            step_days: 1,
            advance_on_empty: true,
        }
    }

    async fn list_page(&mut self, symbol: &str, page_date: DateTime<Utc>) -> Result<Listing> {
        let url = format!(
            "https://www.marketwatch.com/news/headline/getheadlines?ticker={0}&dateTime={1}\
             &countryCode=US&count=16&channelName=%2Fnews%2Flatest%2Fcompany%2Fus%{0}",
            symbol,
            format_page_date(page_date)
        );
        let items: Vec<serde_json::Value> = self.client.get(&url).send().await?.json().await?;

        let candidates: Vec<Candidate> = items
            .iter()
            .filter_map(|item| item.get("SeoHeadlineFragment").and_then(|v| v.as_str()))
            .map(|fragment| Candidate {
                date: page_date.date_naive(),
                url: format!("https://www.marketwatch.com/story{}", fragment),
            })
            .collect();

        if candidates.is_empty() {
            Ok(Listing::Empty)
        } else {
            Ok(Listing::Items(candidates))
        }
    }

    async fn fetch_article(&mut self, url: &str) -> Result<Option<Story>> {
        let html = self.client.get(url).send().await?.text().await?;

        let headline = match HEADLINE.captures(&html).and_then(|c| c.get(1)) {
            Some(m) => clean_html_text(m.as_str()),
            None => return Ok(None),
        };

        let region = match slice_between(&html, "articleBody", "author-commentPromo") {
            Some(region) => region,
            None => return Ok(None),
        };

        let paragraphs: Vec<String> = PARAGRAPH
            .captures_iter(region)
            .map(|c| clean_html_text(&c[1]))
            .filter(|p| !self.filter.is_boilerplate(p))
            .collect();

        if paragraphs.is_empty() {
            return Ok(None);
        }

        Ok(Some(Story {
            headline,
            body: paragraphs.join(PARAGRAPH_SEP),
        }))
    }

    async fn fetch_meta(&self, symbol: &str) -> Result<Option<Company>> {
        fetch_company_meta(&self.client, symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn page_date_strips_leading_zeros_and_lowers_meridiem() {
        let date = Utc.with_ymd_and_hms(2020, 3, 5, 16, 30, 0).unwrap();
        assert_eq!(format_page_date(date), "4:30+p.m.+Mar.+5,+2020");

        let date = Utc.with_ymd_and_hms(2020, 11, 12, 9, 5, 0).unwrap();
        assert_eq!(format_page_date(date), "9:05+a.m.+Nov.+12,+2020");
    }
}
