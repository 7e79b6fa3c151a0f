//! Input validation for registration, login, and account updates.
//!
//! Each request type normalizes its inputs (trim, lowercase email) and either
//! yields a validated value or a field-keyed map of every failure found.
//! Field keys are the wire-level camelCase names.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::FieldErrors;

#[allow(clippy::expect_used)] // pattern is a compile-time constant
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid username pattern"));

#[allow(clippy::expect_used)] // pattern is a compile-time constant
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

const NAME_BOUNDS: (usize, usize) = (2, 100);
const USERNAME_MAX: usize = 50;
const PASSWORD_BOUNDS: (usize, usize) = (8, 50);

/// Trim whitespace and lowercase, the canonical form for stored emails.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<ValidRegistration, FieldErrors> {
        // Registration accepts usernames down to 2 characters; update flows
        // require 3.
        let fields = validate_account_fields(
            &self.name,
            &self.username,
            &self.email,
            &self.password,
            &self.confirm_password,
            2,
        )?;
        Ok(ValidRegistration {
            name: fields.name,
            username: fields.username,
            email: fields.email,
            password: fields.password,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UpdateAccountRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone)]
pub struct ValidAccountUpdate {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl UpdateAccountRequest {
    pub fn validate(self) -> Result<ValidAccountUpdate, FieldErrors> {
        let fields = validate_account_fields(
            &self.name,
            &self.username,
            &self.email,
            &self.password,
            &self.confirm_password,
            3,
        )?;
        Ok(ValidAccountUpdate {
            name: fields.name,
            username: fields.username,
            email: fields.email,
            password: fields.password,
        })
    }
}

struct ValidatedFields {
    name: String,
    username: String,
    email: String,
    password: String,
}

fn validate_account_fields(
    name: &str,
    username: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
    username_min: usize,
) -> Result<ValidatedFields, FieldErrors> {
    // Name, username and email are trimmed; passwords are significant
    // verbatim, including whitespace.
    let name = name.trim();
    let username = username.trim();
    let email = normalize_email(email);

    let mut errors = FieldErrors::new();

    if name.is_empty() {
        errors.insert("name", "cannot be blank");
    } else if !char_len_in(name, NAME_BOUNDS.0, NAME_BOUNDS.1) {
        errors.insert(
            "name",
            format!("the length must be between {} and {}", NAME_BOUNDS.0, NAME_BOUNDS.1),
        );
    }

    if username.is_empty() {
        errors.insert("username", "cannot be blank");
    } else if !char_len_in(username, username_min, USERNAME_MAX) {
        errors.insert(
            "username",
            format!("the length must be between {username_min} and {USERNAME_MAX}"),
        );
    } else if !USERNAME_RE.is_match(username) {
        errors.insert("username", "must contain only letters, numbers, or underscore");
    }

    if email.is_empty() {
        errors.insert("email", "cannot be blank");
    } else if !EMAIL_RE.is_match(&email) {
        errors.insert("email", "must be a valid email address");
    }

    if password.is_empty() {
        errors.insert("password", "cannot be blank");
    } else if !char_len_in(password, PASSWORD_BOUNDS.0, PASSWORD_BOUNDS.1) {
        errors.insert(
            "password",
            format!(
                "the length must be between {} and {}",
                PASSWORD_BOUNDS.0, PASSWORD_BOUNDS.1
            ),
        );
    }

    if confirm_password.is_empty() {
        errors.insert("confirmPassword", "cannot be blank");
    } else if confirm_password != password {
        errors.insert("confirmPassword", "passwords do not match");
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedFields {
        name: name.to_string(),
        username: username.to_string(),
        email,
        password: password.to_string(),
    })
}

fn char_len_in(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    len >= min && len <= max
}
