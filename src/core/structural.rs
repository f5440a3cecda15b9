//! Lexical / structural URL features. No network access.
//!
//! Two renditions share the same parsing: the 30-slot vector in {-1, 0, 1}
//! and the named lexical keys (raw counts and 0/1 flags).

use crate::core::heuristics::{contains_ipv4_pattern, has_suspicious_terms, is_shortened};
use crate::core::suffix::{DomainParts, SuffixList};
use crate::core::url_parts::{lenient_host, PortState, UrlParts};
use crate::domain::model::{NamedFeatures, StructuralVector, VECTOR_SLOTS};
use crate::utils::error::{GuardError, Result};
use std::sync::Arc;
use tracing::warn;

/// 有 "//" 出現在這個字元位置之後，就算多餘的雙斜線（named schema）
const DOUBLE_SLASH_OFFSET: usize = 8;
/// 最後一個 "//" 在這個位置以內，視為 scheme 的一部分
const SCHEME_SLASH_LIMIT: usize = 7;

#[derive(Clone)]
pub struct StructuralExtractor {
    suffixes: Arc<SuffixList>,
}

impl Default for StructuralExtractor {
    fn default() -> Self {
        Self::new(SuffixList::bundled())
    }
}

impl StructuralExtractor {
    pub fn new(suffixes: Arc<SuffixList>) -> Self {
        Self { suffixes }
    }

    pub fn suffixes(&self) -> &SuffixList {
        &self.suffixes
    }

    pub fn domain_parts(&self, url: &str) -> DomainParts {
        self.suffixes.split(&lenient_host(url))
    }

    /// Never fails: a broken assembly degrades to 30 zeros.
    pub fn extract(&self, url: &str) -> StructuralVector {
        match self.build_vector(url) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("⚠️ Structural feature assembly failed, using zero vector: {}", e);
                StructuralVector::zeros()
            }
        }
    }

    fn build_vector(&self, url: &str) -> Result<StructuralVector> {
        let parts = UrlParts::split(url);
        let domain = self.domain_parts(url);

        let mut slots: Vec<i8> = Vec::with_capacity(VECTOR_SLOTS);
        slots.push(length_tier(url));
        slots.push(if is_shortened(url) { -1 } else { 1 });
        slots.push(if url.contains('@') { -1 } else { 1 });
        slots.push(double_slash_tier(url));
        slots.push(if parts.netloc.contains('-') { -1 } else { 1 });
        slots.push(subdomain_tier(&domain.subdomain));
        slots.push(if parts.scheme == "https" { 1 } else { -1 });
        // 註冊時間與 favicon 來源沒有計算，固定 1
        slots.push(1);
        slots.push(1);
        slots.push(match parts.port() {
            PortState::Valid(_) => -1,
            PortState::Absent | PortState::Invalid => 1,
        });
        slots.push(if domain.domain.contains("http") { -1 } else { 1 });
        // 12-16: 內容相關，fast 路徑一律中性
        slots.extend([0; 5]);
        // 17-18: SFH / mail submission
        slots.extend([1, 1]);
        // 19-28: 行為訊號
        slots.extend([0; 10]);
        slots.resize(VECTOR_SLOTS, 0);

        let slots: [i8; VECTOR_SLOTS] = slots.try_into().map_err(|v: Vec<i8>| {
            GuardError::extraction(format!("expected {} slots, built {}", VECTOR_SLOTS, v.len()))
        })?;
        Ok(StructuralVector::new(slots))
    }

    /// Lexical half of the named schema; content keys stay 0.
    pub fn extract_named(&self, url: &str) -> NamedFeatures {
        let parts = UrlParts::split(url);
        let domain = self.domain_parts(url);

        NamedFeatures {
            url_length: url.chars().count(),
            has_ip: contains_ipv4_pattern(url),
            has_at_symbol: url.contains('@'),
            has_double_slash: url
                .chars()
                .skip(DOUBLE_SLASH_OFFSET)
                .collect::<String>()
                .contains("//"),
            domain_length: domain.domain.chars().count(),
            has_hyphen: domain.domain.contains('-'),
            subdomain_count: if domain.subdomain.is_empty() {
                0
            } else {
                domain.subdomain.split('.').count()
            },
            tld_length: domain.suffix.chars().count(),
            path_length: parts.path.chars().count(),
            path_depth: parts.path.matches('/').count(),
            has_query: !parts.query.is_empty(),
            query_length: parts.query.chars().count(),
            has_https: url.starts_with("https://"),
            has_http: url.starts_with("http://"),
            has_www: domain.subdomain == "www",
            has_suspicious_terms: has_suspicious_terms(url),
            ..Default::default()
        }
    }
}

/// Vector-schema record using the bundled suffix list.
pub fn extract_structural(url: &str) -> StructuralVector {
    StructuralExtractor::default().extract(url)
}

pub fn extract_named_lexical(url: &str) -> NamedFeatures {
    StructuralExtractor::default().extract_named(url)
}

fn length_tier(url: &str) -> i8 {
    match url.chars().count() {
        n if n < 54 => 1,
        n if n <= 75 => 0,
        _ => -1,
    }
}

fn double_slash_tier(url: &str) -> i8 {
    let count = url.matches("//").count();
    if count <= 1 {
        return 1;
    }
    // 位置用字元計，不是位元組
    let last = url
        .rfind("//")
        .map(|byte_idx| url[..byte_idx].chars().count())
        .unwrap_or(0);
    if last <= SCHEME_SLASH_LIMIT {
        1
    } else {
        -1
    }
}

fn subdomain_tier(subdomain: &str) -> i8 {
    if subdomain.is_empty() {
        return 1;
    }
    match subdomain.matches('.').count() {
        0 | 1 => 0,
        _ => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_tiers() {
        assert_eq!(length_tier(&"a".repeat(53)), 1);
        assert_eq!(length_tier(&"a".repeat(54)), 0);
        assert_eq!(length_tier(&"a".repeat(75)), 0);
        assert_eq!(length_tier(&"a".repeat(76)), -1);
        // 多位元組字元依字元數計算
        assert_eq!(length_tier(&"é".repeat(53)), 1);
    }

    #[test]
    fn test_double_slash_tiers() {
        assert_eq!(double_slash_tier("https://example.com"), 1);
        assert_eq!(double_slash_tier("https://example.com//evil"), -1);
        assert_eq!(double_slash_tier("////"), 1);
    }

    #[test]
    fn test_subdomain_tiers() {
        assert_eq!(subdomain_tier(""), 1);
        assert_eq!(subdomain_tier("www"), 0);
        assert_eq!(subdomain_tier("a.b"), 0);
        assert_eq!(subdomain_tier("a.b.c"), -1);
    }

    #[test]
    fn test_named_lexical_keys() {
        let named = extract_named_lexical("https://www.secure-bank.co.uk/a/b?x=1");
        assert!(named.has_https);
        assert!(!named.has_http);
        assert!(named.has_www);
        assert!(named.has_hyphen);
        assert!(named.has_suspicious_terms);
        assert_eq!(named.domain_length, "secure-bank".len());
        assert_eq!(named.tld_length, "co.uk".len());
        assert_eq!(named.subdomain_count, 1);
        assert_eq!(named.path_depth, 2);
        assert_eq!(named.query_length, 3);
        assert!(!named.has_double_slash);
        assert_eq!(named.form_count, 0);
    }
}
