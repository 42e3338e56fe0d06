use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// Layered checks: high-confidence attack patterns first, then decoded variants

static PATH_TRAVERSAL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\.").unwrap());

// Scheme prefix or protocol-relative double slash
static PROTOCOL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:[a-z][a-z0-9+.-]*:)|(?:/{2,})").unwrap());

// Control characters, encoded CR/LF/NUL, backslashes and invisible separators
static SUSPICIOUS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\x00-\x1F\x7F-\x9F]|%(?:00|0[aAdD]|09|5c)|\\|[\u{200E}\u{200F}\u{2060}-\u{2064}\u{2000}-\u{200A}]").unwrap()
});

const MAX_REDIRECT_LENGTH: usize = 2048;

/// A return-to target that is not a safe in-app path
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedirectError {
    #[error("redirect target must be a relative in-app path")]
    NotRelative,
    #[error("redirect target exceeds {MAX_REDIRECT_LENGTH} characters")]
    TooLong,
    #[error("redirect target contains a suspicious pattern")]
    Suspicious,
}

/// Validate a post-login return-to target
///
/// Only relative in-app paths are accepted. Absolute URLs are refused even
/// for well-formed hosts.
///
/// # Errors
///
/// Returns a [`RedirectError`] describing why the target was refused
pub fn validate_post_auth_redirect(redirect_url: &str) -> Result<String, RedirectError> {
    debug!("Validating post-authentication redirect URL: {redirect_url}");

    if redirect_url.len() > MAX_REDIRECT_LENGTH {
        warn!(
            "Excessively long redirect URL: {} characters",
            redirect_url.len()
        );
        return Err(RedirectError::TooLong);
    }

    validate_suspicious_patterns(redirect_url)?;

    if !is_relative_url(redirect_url) {
        warn!("Refusing non-relative redirect URL: {redirect_url}");
        return Err(RedirectError::NotRelative);
    }

    validate_encoded_patterns(redirect_url)?;

    debug!("Validated relative redirect URL: {redirect_url}");
    Ok(redirect_url.to_string())
}

/// Starts with a single `/` and carries no scheme
fn is_relative_url(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//") && !url.contains(':')
}

fn validate_suspicious_patterns(request_path: &str) -> Result<(), RedirectError> {
    if PATH_TRAVERSAL_PATTERN.is_match(request_path) {
        warn!("Path traversal attempt detected: {request_path}");
        return Err(RedirectError::Suspicious);
    }

    if PROTOCOL_PATTERN.is_match(request_path) {
        warn!("Protocol injection attempt detected: {request_path}");
        return Err(RedirectError::Suspicious);
    }

    if SUSPICIOUS_PATTERN.is_match(request_path) {
        warn!("Suspicious pattern detected: {request_path}");
        return Err(RedirectError::Suspicious);
    }

    Ok(())
}

/// Re-run the checks on single- and double-decoded variants
fn validate_encoded_patterns(request_path: &str) -> Result<(), RedirectError> {
    for decoded in decoded_variants(request_path).iter().skip(1) {
        if PATH_TRAVERSAL_PATTERN.is_match(decoded)
            || PROTOCOL_PATTERN.is_match(decoded)
            || SUSPICIOUS_PATTERN.is_match(decoded)
        {
            warn!("Encoded attack detected: {request_path} -> {decoded}");
            return Err(RedirectError::Suspicious);
        }

        if contains_dangerous_protocol(&decoded.to_lowercase()) {
            warn!("Dangerous protocol detected: {decoded}");
            return Err(RedirectError::Suspicious);
        }

        // Domain confusion
        if decoded.contains('@') {
            warn!("@ in decoded redirect path: {decoded}");
            return Err(RedirectError::Suspicious);
        }
    }

    Ok(())
}

/// The input followed by up to two successive URL decodings that changed it
fn decoded_variants(request_path: &str) -> Vec<String> {
    let mut variants = vec![request_path.to_string()];

    if let Ok(decoded) = urlencoding::decode(request_path) {
        let decoded = decoded.into_owned();
        if decoded != request_path {
            if let Ok(double_decoded) = urlencoding::decode(&decoded) {
                let double_decoded = double_decoded.into_owned();
                variants.push(decoded.clone());
                if double_decoded != decoded {
                    variants.push(double_decoded);
                }
            } else {
                variants.push(decoded);
            }
        }
    }

    variants
}

fn contains_dangerous_protocol(text: &str) -> bool {
    const DANGEROUS_PROTOCOLS: &[&str] = &["javascript:", "vbscript:", "data:", "file:"];

    DANGEROUS_PROTOCOLS
        .iter()
        .any(|protocol| text.contains(protocol))
}
