//! Input validation for API requests.
//!
//! Validation always runs before any persistence call; a request that fails
//! validation performs no writes.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

/// Upper bound on password length, checked before hashing
pub const MAX_PASSWORD_BYTES: usize = 512;

lazy_static! {
    /// Regex for validating email addresses (pragmatic shape check, not RFC 5322)
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)+$").unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a password before it is hashed
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(format!(
            "Password is too long (max {} bytes)",
            MAX_PASSWORD_BYTES
        ));
    }

    Ok(())
}

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 120 {
        return Err("Name is too long (max 120 characters)".to_string());
    }

    Ok(())
}

/// Validate a work date (ISO YYYY-MM-DD)
pub fn validate_work_date(date: Option<&str>) -> Result<(), String> {
    let date = match date {
        Some(d) if !d.is_empty() => d,
        _ => return Err("Date is required".to_string()),
    };

    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| "Date must be in YYYY-MM-DD format".to_string())
}

/// Validate an hours-worked value
pub fn validate_hours(hours: Option<f64>) -> Result<(), String> {
    let hours = hours.ok_or_else(|| "Hours worked are required".to_string())?;

    if !hours.is_finite() {
        return Err("Hours must be a number".to_string());
    }

    if hours < 0.0 {
        return Err("Hours must be non-negative".to_string());
    }

    Ok(())
}
