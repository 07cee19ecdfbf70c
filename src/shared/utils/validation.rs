use regex::Regex;
use std::sync::OnceLock;

use crate::shared::errors::AppError;

fn source_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("source url pattern is valid")
    })
}

pub struct Validator;

impl Validator {
    pub fn validate_source_url(url: &str) -> Result<(), AppError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::ValidationError("URL cannot be empty".to_string()));
        }
        if url.len() > 200 {
            return Err(AppError::ValidationError(
                "URL too long (max 200 characters)".to_string(),
            ));
        }
        if !source_url_pattern().is_match(url) {
            return Err(AppError::ValidationError(format!(
                "'{}' is not an http(s) URL",
                url
            )));
        }
        Ok(())
    }
}
