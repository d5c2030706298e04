use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Clone)]
pub struct PasswordPolicy {
    pub memory_kb: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl PasswordPolicy {
    fn argon2(&self) -> Argon2<'static> {
        use argon2::{Algorithm, Params, Version};
        let params = Params::new(self.memory_kb, self.iterations, self.parallelism, None)
            .expect("invalid argon2 params");
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }
}

pub fn hash_password(policy: &PasswordPolicy, password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = policy
        .argon2()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| e.to_string())?
        .to_string();
    Ok(hash)
}

pub fn verify_password(
    policy: &PasswordPolicy,
    password: &str,
    stored_hash: &str,
) -> Result<bool, String> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| e.to_string())?;
    Ok(policy
        .argon2()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Complexity rules applied at registration and password reset:
/// at least 8 characters with an uppercase letter, a lowercase letter,
/// and a digit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WeakPassword {
    #[error("password must be at least 8 characters")]
    TooShort,
    #[error("password must contain an uppercase letter")]
    MissingUpper,
    #[error("password must contain a lowercase letter")]
    MissingLower,
    #[error("password must contain a number")]
    MissingDigit,
}

pub fn validate_password(password: &str) -> Result<(), WeakPassword> {
    if password.chars().count() < 8 {
        return Err(WeakPassword::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(WeakPassword::MissingUpper);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(WeakPassword::MissingLower);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(WeakPassword::MissingDigit);
    }
    Ok(())
}
