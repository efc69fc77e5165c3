//! Admin authorization seam.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unauthorized")]
pub struct Unauthorized;

/// Decides whether a bearer token may perform admin actions.
pub trait AdminAuthority: Send + Sync {
    fn authorize(&self, token: Option<&str>) -> Result<(), Unauthorized>;
}

/// Accepts exactly one pre-shared token.
pub struct StaticTokenAuthority {
    token: String,
}

impl StaticTokenAuthority {
    pub fn new(token: impl Into<String>) -> Self { Self { token: token.into() } }
}

impl std::fmt::Debug for StaticTokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuthority").field("token", &"[REDACTED]").finish()
    }
}

impl AdminAuthority for StaticTokenAuthority {
    fn authorize(&self, token: Option<&str>) -> Result<(), Unauthorized> {
        match token {
            Some(t) if !self.token.is_empty() && t == self.token => Ok(()),
            _ => Err(Unauthorized),
        }
    }
}
