//! Bearer-token validation.
//!
//! A credential is a 32-character hexadecimal string. Validation is
//! cheap-first: length and character checks happen before any database
//! round trip, and failure reasons never include the presented token
//! itself.

use thiserror::Error;

use crate::models::Permission;
use crate::store::{tokens, Store};

/// Required length of a bearer token.
const TOKEN_LENGTH: usize = 32;

/// Why a presented credential was rejected.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is not exactly 32 characters.
    #[error("The token should be 32 chars long")]
    BadTokenLength,
    /// The token contains non-hexadecimal characters.
    #[error("Token failed character validation")]
    BadTokenCharacters,
    /// No such token exists.
    #[error("An unknown token is used")]
    UnknownToken,
    /// The token exists but has been revoked.
    #[error("A revoked token is used")]
    RevokedToken,
    /// The lookup itself failed.
    #[error("credentials lookup failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Check the shape of a bearer string without touching the database.
///
/// # Errors
///
/// Returns [`AuthError::BadTokenLength`] or
/// [`AuthError::BadTokenCharacters`] when the string cannot possibly be
/// a valid token.
pub fn check_token_format(bearer: &str) -> Result<(), AuthError> {
    if bearer.len() != TOKEN_LENGTH {
        return Err(AuthError::BadTokenLength);
    }
    if !bearer.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AuthError::BadTokenCharacters);
    }
    Ok(())
}

/// A validator for credentials presented by the requestor.
#[derive(Clone)]
pub struct Validator {
    store: Store,
}

impl Validator {
    /// Create a validator backed by the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Resolve a bearer string into a [`Permission`].
    ///
    /// The token row is looked up with its pipeline LEFT JOINed so that
    /// power-user tokens (no pipeline) are still found. A token is
    /// usable iff it exists and has not been revoked.
    ///
    /// # Errors
    ///
    /// Returns the applicable [`AuthError`]; the bearer string is never
    /// part of the error.
    pub async fn token_to_permission(&self, bearer: &str) -> Result<Permission, AuthError> {
        check_token_format(bearer)?;

        let mut conn = self.store.pool().acquire().await?;
        let row = tokens::find(&mut conn, bearer)
            .await?
            .ok_or(AuthError::UnknownToken)?;

        if row.date_revoked.is_some() {
            return Err(AuthError::RevokedToken);
        }

        let permission = match row.pipeline() {
            None => Permission::PowerUser {
                requestor_id: row.token_id,
            },
            Some(pipeline) => Permission::Regular {
                requestor_id: row.token_id,
                pipeline,
            },
        };

        Ok(permission)
    }
}
