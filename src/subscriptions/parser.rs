//! Per-format line parsing, grounded on the teacher's `BlocklistParser`
//! (`blocking/parser.rs`) but narrowed to the four formats named: hosts,
//! dnsmasq, plain, adblock. Pi-hole/unbound formats from the teacher are
//! dropped since nothing in scope names them.

use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Hosts,
    Dnsmasq,
    Plain,
    Adblock,
}

impl SourceFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hosts" => Some(Self::Hosts),
            "dnsmasq" => Some(Self::Dnsmasq),
            "plain" => Some(Self::Plain),
            "adblock" => Some(Self::Adblock),
            _ => None,
        }
    }
}

/// Extracts every domain from `body` according to `format`. Comment
/// prefixes `#`, `!`, `;` and blank lines are skipped; extracted domains
/// are normalized (lowercased, trailing dot and `*.` prefix stripped)
/// and validated; invalid entries are silently dropped.
pub fn parse_body(body: &str, format: SourceFormat) -> Vec<String> {
    body.lines()
        .flat_map(|line| parse_line(line, format))
        .collect()
}

fn parse_line(line: &str, format: SourceFormat) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') || line.starts_with(';') {
        return Vec::new();
    }

    let raw: Vec<&str> = match format {
        SourceFormat::Hosts => parse_hosts(line),
        SourceFormat::Dnsmasq => parse_dnsmasq(line).into_iter().collect(),
        SourceFormat::Plain => vec![line],
        SourceFormat::Adblock => parse_adblock(line).into_iter().collect(),
    };

    raw.into_iter().filter_map(normalize_domain).collect()
}

/// A hosts line is `IP domain [domain ...]`; every alias after the
/// address is a distinct name for the same block/redirect entry.
fn parse_hosts(line: &str) -> Vec<&str> {
    let mut parts = line.split_whitespace();
    let Some(ip) = parts.next() else {
        return Vec::new();
    };
    if ip.parse::<IpAddr>().is_err() {
        return Vec::new();
    }
    parts.collect()
}

fn parse_dnsmasq(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("server=/") {
        rest.split('/').next()
    } else if let Some(rest) = line.strip_prefix("address=/") {
        rest.split('/').next()
    } else {
        None
    }
}

fn parse_adblock(line: &str) -> Option<&str> {
    if line.starts_with("@@") || line.contains('$') || line.contains('/') {
        return None;
    }
    let domain = line.strip_prefix("||")?;
    Some(domain.trim_end_matches('^').trim_end_matches('|'))
}

/// Lowercases, strips a trailing dot and a leading `*.` wildcard, then
/// validates label syntax. Returns `None` for anything malformed.
fn normalize_domain(domain: &str) -> Option<String> {
    let mut domain = domain.trim();
    domain = domain.strip_suffix('.').unwrap_or(domain);
    domain = domain.strip_prefix("*.").unwrap_or(domain);
    let domain = domain.to_ascii_lowercase();
    if is_valid_domain(&domain) {
        Some(domain)
    } else {
        None
    }
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| is_valid_label(label))
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    let chars: Vec<char> = label.chars().collect();
    chars.iter().enumerate().all(|(i, &c)| {
        if i == 0 || i == chars.len() - 1 {
            c.is_ascii_alphanumeric()
        } else {
            c.is_ascii_alphanumeric() || c == '-'
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_format_extracts_domain_and_skips_localhost_alias() {
        let body = "0.0.0.0 ads.example.com\n127.0.0.1 localhost\nnot-an-ip example.com\n";
        let domains = parse_body(body, SourceFormat::Hosts);
        assert_eq!(domains, vec!["ads.example.com"]);
    }

    #[test]
    fn hosts_format_extracts_every_alias_on_the_line() {
        let body = "0.0.0.0 ads.example.com cdn.ads.example.com\n";
        let domains = parse_body(body, SourceFormat::Hosts);
        assert_eq!(domains, vec!["ads.example.com", "cdn.ads.example.com"]);
    }

    #[test]
    fn dnsmasq_format_extracts_domain_from_both_directives() {
        let body = "server=/ads.example.com/1.2.3.4\naddress=/tracker.net/0.0.0.0\n";
        let domains = parse_body(body, SourceFormat::Dnsmasq);
        assert_eq!(domains, vec!["ads.example.com", "tracker.net"]);
    }

    #[test]
    fn plain_format_is_one_domain_per_line() {
        let body = "# comment\nexample.com\n\nsub.example.org\n";
        let domains = parse_body(body, SourceFormat::Plain);
        assert_eq!(domains, vec!["example.com", "sub.example.org"]);
    }

    #[test]
    fn adblock_format_extracts_and_skips_exceptions() {
        let body = "||ads.example.com^\n@@||good.example.com^\n||opts.com^$third-party\n";
        let domains = parse_body(body, SourceFormat::Adblock);
        assert_eq!(domains, vec!["ads.example.com"]);
    }

    #[test]
    fn wildcard_prefix_and_trailing_dot_are_stripped() {
        assert_eq!(normalize_domain("*.Example.COM."), Some("example.com".to_string()));
    }

    #[test]
    fn invalid_domains_are_dropped() {
        assert_eq!(normalize_domain("-bad.com"), None);
        assert_eq!(normalize_domain("no-tld"), None);
    }
}
