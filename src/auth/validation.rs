use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{LoginRequest, RegisterRequest};
use crate::error::{AppError, FieldError};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 128;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid");
    }
    EMAIL_RE.is_match(email)
}

/// Registration input after trimming and case-folding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidLogin {
    pub email: String,
    pub password: String,
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Collects every violated constraint instead of stopping at the first.
pub fn validate_registration(input: RegisterRequest) -> Result<ValidRegistration, AppError> {
    let mut errors = Vec::new();

    let username = input.username.as_deref().map(str::trim).unwrap_or_default();
    let username_len = username.chars().count();
    if username.is_empty() {
        errors.push(FieldError::new("username", "username is required"));
    } else if username_len < USERNAME_MIN {
        errors.push(FieldError::new("username", "username must be at least 3 characters"));
    } else if username_len > USERNAME_MAX {
        errors.push(FieldError::new("username", "username must be at most 50 characters"));
    }

    let email = input.email.as_deref().map(normalize_email).unwrap_or_default();
    if email.is_empty() {
        errors.push(FieldError::new("email", "email is required"));
    } else if !is_valid_email(&email) {
        errors.push(FieldError::new("email", "email is not a valid address"));
    }

    let password = input.password.unwrap_or_default();
    let password_len = password.chars().count();
    if password.is_empty() {
        errors.push(FieldError::new("password", "password is required"));
    } else if password_len < PASSWORD_MIN {
        errors.push(FieldError::new("password", "password must be at least 6 characters"));
    } else if password_len > PASSWORD_MAX {
        errors.push(FieldError::new("password", "password must be at most 128 characters"));
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    Ok(ValidRegistration {
        username: username.to_string(),
        email,
        password,
    })
}

pub fn validate_login(input: LoginRequest) -> Result<ValidLogin, AppError> {
    let mut errors = Vec::new();

    let email = input.email.as_deref().map(normalize_email).unwrap_or_default();
    if email.is_empty() {
        errors.push(FieldError::new("email", "email is required"));
    }
    let password = input.password.unwrap_or_default();
    if password.is_empty() {
        errors.push(FieldError::new("password", "password is required"));
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    Ok(ValidLogin { email, password })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: Option<&str>, email: Option<&str>, password: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.map(Into::into),
            email: email.map(Into::into),
            password: password.map(Into::into),
        }
    }

    fn fields(err: AppError) -> Vec<&'static str> {
        match err {
            AppError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("spaced out@example.com"));
    }

    #[test]
    fn registration_is_normalized() {
        let valid = validate_registration(register(
            Some("  abc  "),
            Some("  A@B.Com "),
            Some("secret1"),
        ))
        .expect("valid input");
        assert_eq!(valid.username, "abc");
        assert_eq!(valid.email, "a@b.com");
        assert_eq!(valid.password, "secret1");
    }

    #[test]
    fn registration_reports_every_violation() {
        let err = validate_registration(register(Some("ab"), Some("nope"), Some("12345"))).unwrap_err();
        assert_eq!(fields(err), ["username", "email", "password"]);
    }

    #[test]
    fn registration_treats_missing_fields_as_violations() {
        let err = validate_registration(register(None, None, None)).unwrap_err();
        assert_eq!(fields(err), ["username", "email", "password"]);

        // whitespace only trims down to nothing
        let err = validate_registration(register(Some("   "), Some("a@b.com"), Some("secret1"))).unwrap_err();
        assert_eq!(fields(err), ["username"]);
    }

    #[test]
    fn registration_boundaries() {
        assert!(validate_registration(register(Some("abc"), Some("a@b.com"), Some("123456"))).is_ok());
        let long_name = "x".repeat(USERNAME_MAX + 1);
        let err = validate_registration(register(Some(long_name.as_str()), Some("a@b.com"), Some("123456"))).unwrap_err();
        assert_eq!(fields(err), ["username"]);
        let long_pw = "p".repeat(PASSWORD_MAX + 1);
        let err = validate_registration(register(Some("abc"), Some("a@b.com"), Some(long_pw.as_str()))).unwrap_err();
        assert_eq!(fields(err), ["password"]);
    }

    #[test]
    fn login_requires_both_fields() {
        let err = validate_login(LoginRequest {
            email: None,
            password: Some("x".into()),
        })
        .unwrap_err();
        assert_eq!(fields(err), ["email"]);

        let err = validate_login(LoginRequest {
            email: Some("a@b.com".into()),
            password: Some(String::new()),
        })
        .unwrap_err();
        assert_eq!(fields(err), ["password"]);

        let ok = validate_login(LoginRequest {
            email: Some(" A@B.COM".into()),
            password: Some("whatever".into()),
        })
        .unwrap();
        assert_eq!(ok.email, "a@b.com");
    }
}
