//! Caller identity verification.
//!
//! Token verification is a collaborator of the vocabulary core: the core only
//! needs a user id and a permission list. `StaticTokenVerifier` resolves
//! tokens from a configured table, which is enough for the CLI and tests;
//! any other provider plugs in through `IdentityVerifier`.

use std::collections::HashMap;

use thiserror::Error;
use time::OffsetDateTime;

/// Permission required to generate lessons.
pub const PERMISSION_WRITE: &str = "write:vocabulary";
/// Permission required to read lesson history and categories.
pub const PERMISSION_READ: &str = "read:vocabulary";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    #[error("Insufficient permission ({0}). You don't have access to this resource")]
    InsufficientPermission(String),

    #[error("Malformed token table entry: {0}")]
    MalformedEntry(String),
}

/// Verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub permissions: Vec<String>,
}

impl Identity {
    /// Fails unless the identity carries `permission`.
    pub fn require(&self, permission: &str) -> Result<(), AuthError> {
        if self.permissions.iter().any(|p| p == permission) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermission(permission.to_string()))
        }
    }
}

/// Resolves bearer tokens to identities.
pub trait IdentityVerifier: Send + Sync {
    /// Returns the identity behind `token`.
    ///
    /// # Errors
    ///
    /// Fails with `AuthError` for unknown or expired tokens.
    fn verify_identity(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Verifies `token` and checks it grants `permission`.
pub fn authorize(
    verifier: &dyn IdentityVerifier,
    token: &str,
    permission: &str,
) -> Result<Identity, AuthError> {
    let identity = verifier.verify_identity(token)?;
    identity.require(permission)?;
    Ok(identity)
}

#[derive(Debug, Clone)]
struct TokenEntry {
    identity: Identity,
    expires_at: Option<i64>,
}

/// Token table verifier.
///
/// Entries are separated by `;` and written `token=user:perm1|perm2`, with an
/// optional `@<unix seconds>` expiry suffix.
///
/// # Examples
///
/// ```
/// use lexis::auth::{IdentityVerifier, StaticTokenVerifier};
///
/// let verifier = StaticTokenVerifier::parse("abc=user123:read:vocabulary|write:vocabulary").unwrap();
/// let identity = verifier.verify_identity("abc").unwrap();
/// assert_eq!(identity.user_id, "user123");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    entries: HashMap<String, TokenEntry>,
}

impl StaticTokenVerifier {
    /// Parses a token table.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedEntry` for entries without a user or with
    /// an expiry that does not fit in an `i64`.
    pub fn parse(table: &str) -> Result<Self, AuthError> {
        let mut entries = HashMap::new();

        for raw in table.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (token, rest) = raw
                .split_once('=')
                .ok_or_else(|| AuthError::MalformedEntry(raw.to_string()))?;

            // Only an all-digit suffix is an expiry; user ids may contain '@'.
            let (rest, expires_at) = match rest.rsplit_once('@') {
                Some((rest, expiry))
                    if !expiry.trim().is_empty()
                        && expiry.trim().bytes().all(|b| b.is_ascii_digit()) =>
                {
                    let expiry = expiry
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| AuthError::MalformedEntry(raw.to_string()))?;
                    (rest, Some(expiry))
                }
                _ => (rest, None),
            };

            // Permission names contain ':' themselves, so only the first one
            // separates the user id.
            let (user_id, permissions) = rest.split_once(':').unwrap_or((rest, ""));
            if token.trim().is_empty() || user_id.trim().is_empty() {
                return Err(AuthError::MalformedEntry(raw.to_string()));
            }

            let permissions = permissions
                .split('|')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();

            entries.insert(
                token.trim().to_string(),
                TokenEntry {
                    identity: Identity {
                        user_id: user_id.trim().to_string(),
                        permissions,
                    },
                    expires_at,
                },
            );
        }

        Ok(Self { entries })
    }

    /// Number of configured tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn verify_identity(&self, token: &str) -> Result<Identity, AuthError> {
        let entry = self.entries.get(token).ok_or(AuthError::InvalidToken)?;

        if let Some(expires_at) = entry.expires_at
            && OffsetDateTime::now_utc().unix_timestamp() >= expires_at
        {
            return Err(AuthError::Expired);
        }

        Ok(entry.identity.clone())
    }
}
