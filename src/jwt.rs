//! JWT token generation and validation.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token kind for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived access token (1 hour) authorizing individual calls
    Access,
    /// Long-lived refresh token (30 days) used only to mint new access tokens
    Refresh,
}

/// Claims signed into every token. Both kinds share the same structure;
/// only `kind` and the lifetime behind `exp` differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (numeric user id)
    pub sub: i64,
    /// Subject email
    pub email: String,
    /// Token kind
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Token lifetime configuration. The constants are source-observed defaults,
/// overridable from the CLI.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    /// Access token lifetime in seconds
    pub access_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_secs: u64,
    /// Remaining-lifetime threshold under which a refresh token is replaced
    /// during rotation
    pub renewal_window_secs: u64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_secs: 60 * 60,
            refresh_secs: 30 * 24 * 60 * 60,
            renewal_window_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl TokenLifetimes {
    pub fn lifetime(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_secs,
            TokenKind::Refresh => self.refresh_secs,
        }
    }
}

/// An access/refresh pair minted together at login or registration.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Signing and verification of tokens with a process-wide symmetric key.
#[derive(Clone)]
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetimes: TokenLifetimes,
}

/// Errors from token minting.
#[derive(Debug)]
pub enum MintError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
}

/// Errors from token verification, distinguishable by the caller.
#[derive(Debug)]
pub enum VerifyError {
    /// The string cannot be decoded or the signature does not match.
    /// Treated as forged or corrupted; no claim is trusted.
    Malformed(jsonwebtoken::errors::Error),
    /// Signature valid but the token is past its expiry.
    Expired,
}

impl JwtCodec {
    /// Create a codec with the given secret and default lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_lifetimes(secret, TokenLifetimes::default())
    }

    pub fn with_lifetimes(secret: &[u8], lifetimes: TokenLifetimes) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetimes,
        }
    }

    pub fn lifetimes(&self) -> &TokenLifetimes {
        &self.lifetimes
    }

    /// Mint a token of the given kind for a subject. `expiry = now + lifetime(kind)`.
    /// Pure computation; the signature covers the full claim set.
    pub fn mint(
        &self,
        kind: TokenKind,
        subject_id: i64,
        subject_email: &str,
        now: u64,
    ) -> Result<String, MintError> {
        let claims = Claims {
            sub: subject_id,
            email: subject_email.to_string(),
            kind,
            iat: now,
            exp: now + self.lifetimes.lifetime(kind),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(MintError::Encoding)
    }

    /// Mint an access/refresh pair, as issued to a principal at login.
    pub fn mint_pair(
        &self,
        subject_id: i64,
        subject_email: &str,
        now: u64,
    ) -> Result<TokenPair, MintError> {
        Ok(TokenPair {
            access: self.mint(TokenKind::Access, subject_id, subject_email, now)?,
            refresh: self.mint(TokenKind::Refresh, subject_id, subject_email, now)?,
        })
    }

    /// Validate a token's signature and expiry and extract its claims.
    ///
    /// Expiry is checked against the caller-supplied `now` rather than the
    /// wall clock, so verification is a pure function of (token, key, now).
    /// The token kind is returned, not enforced; callers check it against
    /// the operation consuming the token.
    pub fn verify(&self, token: &str, now: u64) -> Result<Claims, VerifyError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(VerifyError::Malformed)?;

        if now > token_data.claims.exp {
            return Err(VerifyError::Expired);
        }

        Ok(token_data.claims)
    }
}

/// Current Unix timestamp in seconds. Callers take one snapshot per
/// verification/rotation pass so a token cannot straddle its expiry within
/// a single request.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl std::fmt::Display for MintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MintError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
        }
    }
}

impl std::error::Error for MintError {}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::Malformed(e) => write!(f, "Malformed token: {}", e),
            VerifyError::Expired => write!(f, "Token expired"),
        }
    }
}

impl std::error::Error for VerifyError {}
