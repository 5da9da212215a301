//! Helpers for rendering activity descriptions that embed links.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

pub const DEFAULT_DOMAIN_LENGTH: usize = 25;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+").expect("URL pattern compiles"));

/// Every http(s) URL in `text`, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<&str> {
    URL_PATTERN
        .find_iter(text)
        .map(|found| found.as_str())
        .collect()
}

/// Host of `raw` without a leading `www.`, shortened to `max_length` characters.
/// Text that does not parse as a URL is shortened as-is.
pub fn short_domain(raw: &str, max_length: usize) -> String {
    let domain = Url::parse(raw)
        .ok()
        .and_then(|url| url.host_str().map(ToOwned::to_owned))
        .map(|host| host.strip_prefix("www.").map(ToOwned::to_owned).unwrap_or(host))
        .unwrap_or_else(|| raw.to_string());

    truncate(&domain, max_length)
}

fn truncate(value: &str, max_length: usize) -> String {
    if value.chars().count() > max_length {
        let head = value.chars().take(max_length).collect::<String>();
        format!("{head}...")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_urls_between_text() {
        let text = "notes at https://www.example.com/a?b=1 and HTTP://docs.rs/regex, done";
        assert_eq!(
            extract_urls(text),
            vec!["https://www.example.com/a?b=1", "HTTP://docs.rs/regex,"]
        );
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn shortens_domains() {
        assert_eq!(
            short_domain("https://www.github.com/rust-lang", DEFAULT_DOMAIN_LENGTH),
            "github.com"
        );
        assert_eq!(
            short_domain("https://a-very-long-subdomain.example-company.com", 10),
            "a-very-lon..."
        );
        assert_eq!(short_domain("not a url", 5), "not a...");
    }
}
