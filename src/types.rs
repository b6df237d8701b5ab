//! Field validation shared by the request handlers.
//!
//! Each check returns a human-readable problem; handlers attach it to the
//! offending field with `ApiError::invalid_field`.

use chrono::NaiveDate;

use crate::database::models::user::{NAME_MAX_LENGTH, PASSWORD_MIN_LENGTH};

const EMAIL_MAX_LENGTH: usize = 254;

pub fn validate_email_format(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }

    if email.len() > EMAIL_MAX_LENGTH || email.chars().any(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    let (local, domain) = email.split_once('@').ok_or_else(|| "Invalid email format".to_string())?;
    if local.is_empty() || domain.contains('@') {
        return Err("Invalid email format".to_string());
    }

    // The domain needs at least one dot with a label on either side.
    let mut labels = domain.split('.');
    if labels.clone().count() < 2 || labels.any(str::is_empty) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    validate_length(name, NAME_MAX_LENGTH)
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(format!("Password must be at least {} characters", PASSWORD_MIN_LENGTH));
    }
    Ok(())
}

/// Counts characters, not bytes.
pub fn validate_length(value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("Must be at most {} characters", max));
    }
    Ok(())
}

/// Only absolute http(s) URLs may be stored for icons, banners and sites.
pub fn validate_url(value: &str) -> Result<(), String> {
    let url = url::Url::parse(value).map_err(|e| format!("Invalid URL: {}", e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("URL scheme must be http or https, not {}", other)),
    }
}

pub fn validate_birthdate(birthdate: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if birthdate > today {
        return Err("Birthdate cannot be in the future".to_string());
    }
    Ok(())
}
