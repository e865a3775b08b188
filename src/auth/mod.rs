//! Dual-token JWT authentication.
//!
//! Short-lived access tokens (1 hour, stateless) paired with long-lived
//! refresh tokens (30 days). When an access token lapses mid-session, the
//! authorizer middleware silently rotates it off the refresh token and the
//! propagator returns the replacement on the same channel the credential
//! arrived on (bearer headers for the API, cookies for browser sessions).

mod cookie;
mod errors;
mod extract;
mod middleware;
mod rotation;

pub use cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, build_cookie, clear_cookie, get_cookie};
pub use errors::{ApiAuthError, AuthErrorKind, PageAuthError};
pub use extract::CurrentUser;
pub use middleware::{
    AuthState, CredentialChannel, NEW_ACCESS_TOKEN_HEADER, NEW_REFRESH_TOKEN_HEADER,
    ProtectedRoutes, REFRESH_TOKEN_HEADER, RouteGuard, StagedTokens, authorize,
    propagate_rotated_tokens,
};
pub use rotation::{RotationOutcome, rotate};
