//! Lenient URL splitting.
//!
//! `url::Url` rejects or normalizes too much of what phishing URLs contain
//! (default ports vanish, scheme-less input fails), so the lexical features are
//! computed on a splitter that accepts any string and never fails.

const SCHEME_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+-.";

/// Schemes whose last path segment may carry `;params`.
const PARAM_SCHEMES: &[&str] = &[
    "", "ftp", "hdl", "prospero", "http", "imap", "https", "shttp", "rtsp", "rtspu", "sip",
    "sips", "mms", "sftp", "tel",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Absent,
    Valid(u16),
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts<'a> {
    pub scheme: String,
    pub netloc: &'a str,
    pub path: &'a str,
    pub params: &'a str,
    pub query: &'a str,
    pub fragment: &'a str,
}

fn is_scheme(candidate: &str) -> bool {
    candidate
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic())
        .unwrap_or(false)
        && candidate.chars().all(|c| SCHEME_CHARS.contains(c))
}

impl<'a> UrlParts<'a> {
    pub fn split(url: &'a str) -> Self {
        let mut rest = url.trim();
        let mut scheme = String::new();

        if let Some(idx) = rest.find(':') {
            let candidate = &rest[..idx];
            if idx > 0 && is_scheme(candidate) {
                scheme = candidate.to_ascii_lowercase();
                rest = &rest[idx + 1..];
            }
        }

        let mut netloc = "";
        if let Some(after) = rest.strip_prefix("//") {
            let end = after.find(['/', '?', '#']).unwrap_or(after.len());
            netloc = &after[..end];
            rest = &after[end..];
        }

        let mut fragment = "";
        if let Some(idx) = rest.find('#') {
            fragment = &rest[idx + 1..];
            rest = &rest[..idx];
        }

        let mut query = "";
        if let Some(idx) = rest.find('?') {
            query = &rest[idx + 1..];
            rest = &rest[..idx];
        }

        let (path, params) = if PARAM_SCHEMES.contains(&scheme.as_str()) {
            split_params(rest)
        } else {
            (rest, "")
        };

        Self {
            scheme,
            netloc,
            path,
            params,
            query,
            fragment,
        }
    }

    /// Host and port section of the netloc (userinfo removed).
    fn hostinfo(&self) -> &'a str {
        match self.netloc.rfind('@') {
            Some(idx) => &self.netloc[idx + 1..],
            None => self.netloc,
        }
    }

    /// Lowercased hostname of the netloc, without userinfo, port or brackets.
    pub fn host(&self) -> String {
        let hostinfo = self.hostinfo();
        let host = match hostinfo.strip_prefix('[') {
            Some(bracketed) => bracketed.split(']').next().unwrap_or(""),
            None => hostinfo.split(':').next().unwrap_or(""),
        };
        host.trim_end_matches('.').to_lowercase()
    }

    pub fn port(&self) -> PortState {
        let hostinfo = self.hostinfo();
        let port = match hostinfo.split_once('[') {
            Some((_, bracketed)) => bracketed
                .split_once(']')
                .and_then(|(_, tail)| tail.split_once(':'))
                .map(|(_, port)| port)
                .unwrap_or(""),
            None => hostinfo.split_once(':').map(|(_, port)| port).unwrap_or(""),
        };

        if port.is_empty() {
            return PortState::Absent;
        }
        if !port.chars().all(|c| c.is_ascii_digit()) {
            return PortState::Invalid;
        }
        match port.parse::<u32>() {
            Ok(value) if value <= u32::from(u16::MAX) => PortState::Valid(value as u16),
            _ => PortState::Invalid,
        }
    }
}

fn split_params(path: &str) -> (&str, &str) {
    let search_from = path.rfind('/').unwrap_or(0);
    match path[search_from..].find(';') {
        Some(offset) => {
            let idx = search_from + offset;
            (&path[..idx], &path[idx + 1..])
        }
        None => (path, ""),
    }
}

/// Host as a public-suffix lookup sees it: scheme, userinfo, port and trailing dots removed.
pub fn lenient_host(url: &str) -> String {
    let schemeless = strip_scheme(url.trim());
    let end = schemeless.find(['/', '?', '#']).unwrap_or(schemeless.len());
    let authority = &schemeless[..end];
    let after_userinfo = match authority.rfind('@') {
        Some(idx) => &authority[idx + 1..],
        None => authority,
    };

    if after_userinfo.starts_with('[') {
        // IPv6 字面值，保留括號內的位址
        if let Some(close) = after_userinfo.find(']') {
            return after_userinfo[1..close].to_ascii_lowercase();
        }
    }

    let hostname = after_userinfo
        .split(':')
        .next()
        .unwrap_or("")
        .trim();
    hostname
        .trim_end_matches(['.', '\u{3002}', '\u{ff0e}', '\u{ff61}'])
        .to_lowercase()
}

fn strip_scheme(url: &str) -> &str {
    match url.find("//") {
        Some(0) => &url[2..],
        Some(idx) if idx >= 2 => {
            let scheme = &url[..idx - 1];
            if url[..idx].ends_with(':') && scheme.chars().all(|c| SCHEME_CHARS.contains(c)) {
                &url[idx + 2..]
            } else {
                url
            }
        }
        _ => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_url() {
        let parts = UrlParts::split("HTTPS://user@www.example.com:8443/a/b;v=1?q=2#frag");
        assert_eq!(parts.scheme, "https");
        assert_eq!(parts.netloc, "user@www.example.com:8443");
        assert_eq!(parts.path, "/a/b");
        assert_eq!(parts.params, "v=1");
        assert_eq!(parts.query, "q=2");
        assert_eq!(parts.fragment, "frag");
        assert_eq!(parts.port(), PortState::Valid(8443));
        assert_eq!(parts.host(), "www.example.com");
    }

    #[test]
    fn test_split_without_scheme() {
        let parts = UrlParts::split("example.com/login");
        assert_eq!(parts.scheme, "");
        assert_eq!(parts.netloc, "");
        assert_eq!(parts.path, "example.com/login");
        assert_eq!(parts.port(), PortState::Absent);
    }

    #[test]
    fn test_port_edge_cases() {
        assert_eq!(UrlParts::split("http://a.com:").port(), PortState::Absent);
        assert_eq!(UrlParts::split("http://a.com:abc").port(), PortState::Invalid);
        assert_eq!(UrlParts::split("http://a.com:70000").port(), PortState::Invalid);
        assert_eq!(UrlParts::split("http://[::1]:8080/").port(), PortState::Valid(8080));
        assert_eq!(UrlParts::split("https://a.com:443").port(), PortState::Valid(443));
    }

    #[test]
    fn test_lenient_host() {
        assert_eq!(lenient_host("https://user:pw@WWW.Example.COM.:80/x"), "www.example.com");
        assert_eq!(lenient_host("example.org/path?q"), "example.org");
        assert_eq!(lenient_host("//cdn.example.net/lib.js"), "cdn.example.net");
        assert_eq!(lenient_host("http://[2001:db8::1]:8080/"), "2001:db8::1");
        assert_eq!(lenient_host(""), "");
    }
}
