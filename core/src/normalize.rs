//! Canonical forms for contact fields, shared by the analyzers and the
//! duplicate matcher so both compare values the same way.

use url::Url;

const LEGAL_SUFFIXES: &[&str] = &["pty", "ltd", "limited", "inc", "co", "the"];

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Domain part of an email address, lowercased.
pub fn email_domain(raw: &str) -> Option<String> {
    let normalized = normalize_email(raw);
    let (_, domain) = normalized.rsplit_once('@')?;
    let domain = domain.trim_start_matches("www.");
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

/// Parse a website the way owners type it: a missing scheme means https.
pub fn parse_website(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    if !host.contains('.') || host.starts_with('.') || host.ends_with('.') {
        return None;
    }
    Some(url)
}

/// Lowercased host without a leading `www.`.
pub fn website_host(raw: &str) -> Option<String> {
    let url = parse_website(raw)?;
    let host = url.host_str()?.to_lowercase();
    Some(host.trim_start_matches("www.").to_string())
}

/// Comparison key for a website: host plus path, no scheme, `www.` or trailing slash.
pub fn website_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    without_scheme
        .trim_start_matches("www.")
        .trim_end_matches('/')
        .to_string()
}

/// Business name reduced to lowercase alphanumerics, legal suffixes dropped.
/// "The Brewhouse Coffee Co. Pty Ltd" becomes "brewhousecoffee".
pub fn name_key(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty() && !LEGAL_SUFFIXES.contains(word))
        .collect()
}

/// Case- and whitespace-insensitive form used for equality checks.
pub fn text_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// ABN format check: 11 digits passing the modulus-89 checksum.
pub fn is_valid_abn(raw: &str) -> bool {
    const WEIGHTS: [u32; 11] = [10, 1, 3, 5, 7, 9, 11, 13, 15, 17, 19];

    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() != 11 || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = cleaned.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits[0] == 0 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, digit)| {
            let digit = if i == 0 { digit - 1 } else { *digit };
            digit * WEIGHTS[i]
        })
        .sum();
    sum % 89 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abn_checksum_accepts_known_good_number() {
        assert!(is_valid_abn("51 824 753 556"));
        assert!(!is_valid_abn("51 824 753 557"));
        assert!(!is_valid_abn("1234"));
        assert!(!is_valid_abn("51-824-753-556"));
    }

    #[test]
    fn name_key_drops_legal_suffixes_and_punctuation() {
        assert_eq!(name_key("The Brewhouse Coffee Co. Pty Ltd"), "brewhousecoffee");
        assert_eq!(name_key("Joe's Plumbing"), "joesplumbing");
    }

    #[test]
    fn website_helpers_tolerate_missing_scheme() {
        assert_eq!(
            website_host("www.Example.com.au/menu").as_deref(),
            Some("example.com.au")
        );
        assert!(parse_website("not a url").is_none());
        assert!(parse_website("ftp://example.com").is_none());
        assert_eq!(website_key("https://www.example.com/"), "example.com");
    }

    #[test]
    fn email_domain_strips_case_and_www() {
        assert_eq!(
            email_domain(" Hello@WWW.Example.com ").as_deref(),
            Some("example.com")
        );
        assert_eq!(email_domain("no-at-sign"), None);
    }
}
