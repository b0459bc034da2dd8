use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{
    errors::ApiError,
    models::{LoginRequest, RegisterRequest},
};

/// Minimum password length the backend accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Claims
///
/// The part of the backend's JWT payload the shell cares about. The token is otherwise
/// opaque: the shell never holds the signing secret, so these claims are read without
/// verification and only ever used to skip a round-trip for a token that is already dead.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: Option<i64>,
    /// Issued At (iat).
    pub iat: Option<i64>,
}

/// token_expired
///
/// Returns `Some(true)` when the token is a JWT whose `exp` lies at or before `now`,
/// `Some(false)` when it carries a future `exp`, and `None` when the token is not a
/// decodable JWT or has no expiry. `None` means "ask the backend".
pub fn token_expired(token: &str, now: DateTime<Utc>) -> Option<bool> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    // Expiry is compared below against the caller's clock, without leeway.
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    let exp = data.claims.exp?;
    let expires_at = DateTime::<Utc>::from_timestamp(exp, 0)?;
    Some(expires_at <= now)
}

/// is_valid_email
///
/// `local@domain.tld` with no whitespace and exactly one `@`, the shape the sign-in and
/// sign-up forms accept.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// validate_login
///
/// Client-side checks before any credential leaves the shell. Returns the request as it
/// should be sent (email trimmed).
pub fn validate_login(request: &LoginRequest) -> Result<LoginRequest, ApiError> {
    let email = request.email.trim();
    if !is_valid_email(email) {
        return Err(ApiError::Validation(
            "Please enter a valid email address.".to_string(),
        ));
    }
    check_password(&request.password)?;

    Ok(LoginRequest {
        email: email.to_string(),
        password: request.password.clone(),
    })
}

/// validate_registration
///
/// Same checks as sign-in plus a non-blank name. Normalizes the payload: name trimmed,
/// email trimmed and lowercased, blank optional fields dropped.
pub fn validate_registration(request: &RegisterRequest) -> Result<RegisterRequest, ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Please enter full name.".to_string()));
    }
    let email = request.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation(
            "Please enter a valid email address.".to_string(),
        ));
    }
    check_password(&request.password)?;

    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Ok(RegisterRequest {
        name: name.to_string(),
        email,
        password: request.password.clone(),
        profile_image_url: non_blank(&request.profile_image_url),
        admin_invite_token: non_blank(&request.admin_invite_token),
    })
}
