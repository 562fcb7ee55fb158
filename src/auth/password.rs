use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

/// Outcome of checking a login attempt against what is stored for the username.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Match,
    WrongPassword,
    UnknownUser,
    /// The stored hash could not be parsed as a PHC string.
    Unusable,
}

impl PasswordCheck {
    pub fn is_match(self) -> bool {
        self == PasswordCheck::Match
    }
}

/// Argon2id with a fresh random salt, encoded as a PHC string.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("argon2 hash: {e}"))
}

/// Checks `plain` against the stored hash of the account, if there is one.
///
/// An unknown user still pays for one verification against a throwaway hash,
/// so the response time does not tell registered names apart.
pub fn check_password(plain: &str, stored: Option<&str>) -> PasswordCheck {
    lazy_static! {
        static ref DECOY_HASH: Option<String> = hash_password("decoy").ok();
    }

    let Some(stored) = stored else {
        if let Some(decoy) = DECOY_HASH.as_deref() {
            let _ = verify(plain, decoy);
        }
        return PasswordCheck::UnknownUser;
    };

    match verify(plain, stored) {
        Ok(true) => PasswordCheck::Match,
        Ok(false) => PasswordCheck::WrongPassword,
        Err(e) => {
            error!(error = %e, "stored password hash is unusable");
            PasswordCheck::Unusable
        }
    }
}

fn verify(plain: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
