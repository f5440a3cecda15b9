use crate::utils::error::{GuardError, Result};
use once_cell::sync::Lazy;
use publicsuffix::{List, Psl};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Full Public Suffix List compiled into the binary; only its ICANN section is used.
const BUNDLED_LIST: &str = include_str!("../../data/public_suffix_list.dat");

const PRIVATE_SECTION_MARKER: &str = "===BEGIN PRIVATE DOMAINS===";

static BUNDLED: Lazy<Arc<SuffixList>> = Lazy::new(|| {
    Arc::new(
        SuffixList::from_list_text(BUNDLED_LIST).expect("bundled public suffix list must parse"),
    )
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainParts {
    pub subdomain: String,
    pub domain: String,
    pub suffix: String,
}

impl DomainParts {
    /// `domain.suffix`, or just the domain when there is no known suffix.
    pub fn registered_domain(&self) -> String {
        match (self.domain.is_empty(), self.suffix.is_empty()) {
            (true, _) => String::new(),
            (false, true) => self.domain.clone(),
            (false, false) => format!("{}.{}", self.domain, self.suffix),
        }
    }
}

pub struct SuffixList {
    list: List,
}

impl SuffixList {
    pub fn bundled() -> Arc<SuffixList> {
        Arc::clone(&BUNDLED)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_list_text(&content)
    }

    /// 只使用 ICANN 區段，私有網域（blogspot.com 之類）不當成後綴
    pub fn from_list_text(content: &str) -> Result<Self> {
        let icann_only = match content.find(PRIVATE_SECTION_MARKER) {
            Some(idx) => &content[..idx],
            None => content,
        };
        let list: List = icann_only.parse().map_err(|e| GuardError::ConfigError {
            message: format!("invalid public suffix list: {:?}", e),
        })?;
        Ok(Self { list })
    }

    pub fn split(&self, host: &str) -> DomainParts {
        let host = host.trim_end_matches('.').to_lowercase();
        if host.is_empty() {
            return DomainParts::default();
        }

        if host.parse::<IpAddr>().is_ok() {
            return DomainParts {
                domain: host,
                ..Default::default()
            };
        }

        let labels: Vec<&str> = host.split('.').collect();
        let suffix_labels = self
            .list
            .suffix(host.as_bytes())
            .filter(|suffix| suffix.is_known())
            .and_then(|suffix| std::str::from_utf8(suffix.as_bytes()).ok())
            .map(|suffix| suffix.split('.').count())
            .unwrap_or(0)
            .min(labels.len());

        let suffix_index = labels.len() - suffix_labels;
        let suffix = labels[suffix_index..].join(".");
        let domain = if suffix_index >= 1 {
            labels[suffix_index - 1].to_string()
        } else {
            String::new()
        };
        let subdomain = if suffix_index >= 2 {
            labels[..suffix_index - 1].join(".")
        } else {
            String::new()
        };

        DomainParts {
            subdomain,
            domain,
            suffix,
        }
    }
}
