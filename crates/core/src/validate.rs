//! Field validation helpers shared by command handlers.
//!
//! Every helper returns `DomainError::Validation` naming the offending field.

use crate::error::{DomainError, DomainResult};

/// Require at least `min` characters after trimming.
pub fn min_len(field: &str, value: &str, min: usize) -> DomainResult<()> {
    if value.trim().chars().count() < min {
        return Err(DomainError::validation(format!(
            "{field} must have at least {min} characters"
        )));
    }
    Ok(())
}

/// Require a non-blank value.
pub fn non_blank(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Minimal e-mail shape check: `local@domain.tld`, no whitespace.
pub fn email(field: &str, value: &str) -> DomainResult<()> {
    let err = || DomainError::validation(format!("{field} is not a valid e-mail address"));
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return Err(err());
    }
    let (local, domain) = value.split_once('@').ok_or_else(err)?;
    if local.is_empty() || domain.contains('@') {
        return Err(err());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(err()),
    }
}

/// Require a value made only of ASCII digits whose length is one of `lengths`.
pub fn digits(field: &str, value: &str, lengths: &[usize]) -> DomainResult<()> {
    let value = value.trim();
    let all_digits = !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());
    if !all_digits || !lengths.contains(&value.len()) {
        let allowed = lengths
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        return Err(DomainError::validation(format!(
            "{field} must contain exactly {allowed} digits"
        )));
    }
    Ok(())
}

/// Require an absolute `http://` or `https://` URL with a host part.
pub fn http_url(field: &str, value: &str) -> DomainResult<()> {
    let value = value.trim();
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') && !rest.contains(' ') => Ok(()),
        _ => Err(DomainError::validation(format!(
            "{field} must be an http(s) URL"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_len_trims_first() {
        assert!(min_len("name", "  a  ", 2).is_err());
        assert!(min_len("name", "ab", 2).is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(email("email", "ana@shop.com").is_ok());
        assert!(email("email", "ana@shop").is_err());
        assert!(email("email", "@shop.com").is_err());
        assert!(email("email", "ana shop@x.com").is_err());
        assert!(email("email", "a@b@c.com").is_err());
    }

    #[test]
    fn digit_lengths() {
        assert!(digits("document", "12345678901", &[11, 14]).is_ok());
        assert!(digits("document", "12345678901234", &[11, 14]).is_ok());
        assert!(digits("document", "123456789012", &[11, 14]).is_err());
        assert!(digits("document", "1234567890a", &[11]).is_err());
    }

    #[test]
    fn urls() {
        assert!(http_url("image_url", "https://cdn.example.com/a.png").is_ok());
        assert!(http_url("image_url", "http://x").is_ok());
        assert!(http_url("image_url", "ftp://x").is_err());
        assert!(http_url("image_url", "https://").is_err());
    }

    #[test]
    fn errors_name_the_field() {
        let err = non_blank("sku", "   ").unwrap_err();
        assert_eq!(err, DomainError::validation("sku cannot be empty"));
    }
}
