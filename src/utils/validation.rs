use std::sync::LazyLock;

use regex::Regex;
use url::Url;
use validator::ValidationError;

/// Optional leading '+', then 7 to 15 digits; spaces and dashes allowed between digits.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9](?:[ -]?[0-9]){6,14}$").unwrap());

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_phone"))
    }
}

/// Media (course thumbnails) is hosted externally and referenced by absolute http(s) URL.
pub fn validate_media_url(url: &str) -> Result<(), ValidationError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("invalid_url")),
    }
}
