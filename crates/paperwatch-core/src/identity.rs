//! Canonical identity for deduplication
//!
//! The same article routinely arrives with a DOI wrapped in different
//! resolver prefixes, or with no DOI at all. Everything here is pure,
//! total, and idempotent: `normalize(normalize(x)) == normalize(x)` and
//! no input can make these functions panic.

use crate::record::Paper;

/// Resolver/scheme prefixes stripped from raw DOI strings.
const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// Identity keys derived from title+journal hashes use 128 bits of
/// blake3, rendered as 32 hex chars.
const HASH_KEY_LEN: usize = 32;

/// Normalize a raw DOI: strip resolver/scheme prefixes (repeatedly, so
/// `doi:https://doi.org/...` still resolves), trim, lower-case. Empty
/// input yields empty output.
pub fn normalize_doi(raw: &str) -> String {
    let mut s = raw.trim();
    'strip: loop {
        for prefix in DOI_PREFIXES {
            if let Some(rest) = strip_prefix_ignore_case(s, prefix) {
                s = rest.trim_start();
                continue 'strip;
            }
        }
        break;
    }
    s.trim().to_lowercase()
}

/// Normalize a raw URL so trivially different spellings of the same
/// resource compare equal: fragment dropped, scheme and host
/// lower-cased, default ports removed, trailing slashes trimmed. Query
/// strings are kept (they distinguish resources on some publisher
/// platforms). Strings that are not absolute http(s) URLs pass through
/// trimmed.
pub fn normalize_url(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    let s = s.split('#').next().unwrap_or(s);

    let Some((scheme, rest)) = s.split_once("://") else {
        return s.trim_end_matches('/').to_string();
    };
    let scheme = scheme.to_ascii_lowercase();

    // Host ends at the first path or query separator; only the host is
    // case-folded, paths and queries stay as-is.
    let (host, tail) = match rest.find(['/', '?']) {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    let mut host = host.to_ascii_lowercase();
    let default_port = match scheme.as_str() {
        "http" => Some(":80"),
        "https" => Some(":443"),
        _ => None,
    };
    if let Some(port) = default_port {
        if let Some(bare) = host.strip_suffix(port) {
            host = bare.to_string();
        }
    }

    let mut out = format!("{scheme}://{host}");
    out.push_str(tail.trim_end_matches('/'));
    out
}

/// Deduplication key for a record: the normalized DOI when present,
/// otherwise a content hash of normalized title + journal name. Always
/// non-empty, even for a blank record.
pub fn identity_key(paper: &Paper) -> String {
    let doi = normalize_doi(&paper.doi);
    if !doi.is_empty() {
        return doi;
    }
    let content = format!(
        "{}:{}",
        squash_whitespace(&paper.title.to_lowercase()),
        squash_whitespace(&paper.journal_name.to_lowercase())
    );
    blake3::hash(content.as_bytes()).to_hex()[..HASH_KEY_LEN].to_string()
}

/// Collapse runs of whitespace to single spaces and trim the ends.
fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// ASCII-case-insensitive prefix strip. `prefix` must be ASCII; byte
/// indexing into `s` is guarded so multi-byte input cannot panic.
fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_paper(title: &str, journal: &str) -> Paper {
        Paper {
            title: title.into(),
            journal_name: journal.into(),
            ..Default::default()
        }
    }

    #[test]
    fn normalize_doi_strips_resolver_prefixes() {
        assert_eq!(normalize_doi(" https://doi.org/10.1234/ABC "), "10.1234/abc");
        assert_eq!(normalize_doi("doi:10.1234/abc"), "10.1234/abc");
        assert_eq!(normalize_doi("HTTP://DX.DOI.ORG/10.1234/abc"), "10.1234/abc");
        assert_eq!(normalize_doi("10.1234/abc"), "10.1234/abc");
    }

    #[test]
    fn normalize_doi_strips_stacked_prefixes() {
        assert_eq!(normalize_doi("doi:https://doi.org/10.1/X"), "10.1/x");
    }

    #[test]
    fn normalize_doi_empty_and_prefix_only() {
        assert_eq!(normalize_doi(""), "");
        assert_eq!(normalize_doi("   "), "");
        assert_eq!(normalize_doi("doi:"), "");
    }

    #[test]
    fn normalize_doi_idempotent() {
        let once = normalize_doi("https://doi.org/10.1234/AbC");
        assert_eq!(normalize_doi(&once), once);
    }

    #[test]
    fn normalize_doi_multibyte_input_does_not_panic() {
        // shorter than any prefix but landing mid-codepoint if sliced
        assert_eq!(normalize_doi("日本語"), "日本語");
    }

    #[test]
    fn normalize_url_canonicalizes_host_and_port() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM:443/Path/"),
            "https://example.com/Path"
        );
        assert_eq!(
            normalize_url("http://example.com:80"),
            "http://example.com"
        );
    }

    #[test]
    fn normalize_url_drops_fragment_keeps_query() {
        assert_eq!(
            normalize_url("https://example.com/a?b=1#section"),
            "https://example.com/a?b=1"
        );
    }

    #[test]
    fn normalize_url_query_without_path_not_folded() {
        assert_eq!(
            normalize_url("https://Example.com?Token=AbC"),
            "https://example.com?Token=AbC"
        );
    }

    #[test]
    fn normalize_url_preserves_path_case() {
        assert_eq!(
            normalize_url("https://doi.org/10.1234/AbC"),
            "https://doi.org/10.1234/AbC"
        );
    }

    #[test]
    fn normalize_url_non_url_passthrough() {
        assert_eq!(normalize_url("  not a url  "), "not a url");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn normalize_url_idempotent() {
        for raw in [
            "HTTPS://Example.COM:443/Path/?q=1#frag",
            "plain-string/",
            "ftp://Mixed.Case/keep",
        ] {
            let once = normalize_url(raw);
            assert_eq!(normalize_url(&once), once);
        }
    }

    #[test]
    fn identity_key_prefers_doi() {
        let paper = Paper {
            doi: "https://doi.org/10.1234/ABC".into(),
            title: "Anything".into(),
            journal_name: "J".into(),
            ..Default::default()
        };
        assert_eq!(identity_key(&paper), "10.1234/abc");
    }

    #[test]
    fn identity_key_stable_under_whitespace_and_case() {
        let a = identity_key(&hash_paper("  Sample   Title  ", " Journal X "));
        let b = identity_key(&hash_paper("sample title", "journal x"));
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_KEY_LEN);
    }

    #[test]
    fn identity_key_prefix_only_doi_falls_back_to_hash() {
        let with_empty_doi = Paper {
            doi: "doi:".into(),
            ..hash_paper("Sample Title", "Journal X")
        };
        assert_eq!(
            identity_key(&with_empty_doi),
            identity_key(&hash_paper("Sample Title", "Journal X"))
        );
    }

    #[test]
    fn identity_key_distinguishes_journals() {
        assert_ne!(
            identity_key(&hash_paper("Same Title", "Journal A")),
            identity_key(&hash_paper("Same Title", "Journal B"))
        );
    }

    #[test]
    fn identity_key_never_empty() {
        assert!(!identity_key(&Paper::default()).is_empty());
    }
}
