//! Static lookup tables and string predicates shared by the extractors.

use crate::core::url_parts::UrlParts;
use once_cell::sync::Lazy;
use regex::Regex;

/// Known URL-shortening services.
pub const SHORTENING_SERVICES: &[&str] = &[
    "bit.ly", "goo.gl", "tinyurl.com", "t.co", "tr.im", "is.gd", "cli.gs", "yfrog.com",
    "migre.me", "ff.im", "tiny.cc", "url4.eu", "twit.ac", "su.pr", "twurl.nl", "snipurl.com",
    "short.to", "budurl.com", "ping.fm", "post.ly", "just.as", "bkite.com", "snipr.com",
    "fic.kr", "loopt.us", "doiop.com", "twitthis.com", "htxt.it", "ak.im", "shor.to",
    "rubyurl.com", "om.ly", "to.ly", "bit.do", "adcraft.co", "yep.it", "posted.at", "xurl.es",
    "poprl.com",
];

pub const SUSPICIOUS_TERMS: &[&str] = &[
    "login", "signin", "verify", "secure", "account", "password", "bank",
];

static IPV4_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap());

/// netloc 含有任一短網址服務字串即算（子字串比對，不解析網域）
pub fn is_shortened(url: &str) -> bool {
    let netloc = UrlParts::split(url).netloc;
    SHORTENING_SERVICES
        .iter()
        .any(|shortener| netloc.contains(shortener))
}

pub fn contains_ipv4_pattern(url: &str) -> bool {
    IPV4_PATTERN.is_match(url)
}

pub fn has_suspicious_terms(url: &str) -> bool {
    let lower = url.to_lowercase();
    SUSPICIOUS_TERMS.iter().any(|term| lower.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_shortened() {
        assert!(is_shortened("https://bit.ly/abc"));
        assert!(is_shortened("http://tinyurl.com/xyz"));
        assert!(!is_shortened("https://example.com/abc"));
        assert!(is_shortened("https://www.bit.ly/abc"));
        // 只看 netloc，路徑裡的 bit.ly 不算
        assert!(!is_shortened("https://example.com/bit.ly"));
    }

    #[test]
    fn test_is_shortened_matches_substring_of_netloc() {
        assert!(is_shortened("https://bit.ly.evil.com/x"));
        assert!(is_shortened("https://mybit.ly/"));
        assert!(is_shortened("http://user@tinyurl.com.attacker.net/"));
        // 子字串比對：含 t.co 的主機也算
        assert!(is_shortened("https://www.microsoft.com/"));
        assert!(!is_shortened("https://example.org/tinyurl.com"));
    }

    #[test]
    fn test_ipv4_and_terms() {
        assert!(contains_ipv4_pattern("http://192.168.10.1/login"));
        assert!(!contains_ipv4_pattern("http://example.com"));
        assert!(has_suspicious_terms("https://example.com/SignIn"));
        assert!(!has_suspicious_terms("https://example.com/about"));
    }

    #[test]
    fn test_shortener_list_size() {
        assert_eq!(SHORTENING_SERVICES.len(), 39);
    }
}
