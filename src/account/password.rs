/// Password hashing and strength policy
use crate::error::{ApiError, ApiResult};

/// Hash a password with Argon2id and a fresh random salt
pub fn hash_password(password: &str) -> ApiResult<String> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash; malformed hashes verify as false
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

const MIN_LENGTH: usize = 8;
const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Check the password strength policy, returning every failed rule
pub fn validate_strength(password: &str) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_LENGTH {
        errors.push(format!(
            "Password must be at least {} characters long",
            MIN_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        errors.push("Password must contain at least one special character".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Policy check wrapped into the error taxonomy (400 with field errors)
pub fn require_strength(password: &str) -> ApiResult<()> {
    validate_strength(password).map_err(|errors| ApiError::ValidationDetailed {
        message: "Password does not meet requirements".to_string(),
        errors,
    })
}
