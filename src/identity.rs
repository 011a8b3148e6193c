//! Identity capability
//!
//! The provider never talks to an identity service itself; it consumes the
//! current principal (uid + email) from an injected [`IdentityProvider`].

use std::sync::RwLock;

/// The currently authenticated identity issuing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: String,
    pub email: String,
}

impl Principal {
    pub fn new(uid: &str, email: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.to_string(),
        }
    }
}

/// Capability exposing the current principal, or `None` while signed out.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Principal>;
}

/// Identity provider with a fixed, always-present principal.
///
/// Suits service deployments where the session is established out of band.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    principal: Principal,
}

impl StaticIdentity {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<Principal> {
        Some(self.principal.clone())
    }
}

/// Identity provider backed by a mutable session slot.
///
/// Mirrors an auth-state listener: `sign_in` on a successful login,
/// `sign_out` on logout, readers see whatever the session currently holds.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    session: RwLock<Option<Principal>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(principal: Principal) -> Self {
        Self {
            session: RwLock::new(Some(principal)),
        }
    }

    pub fn sign_in(&self, principal: Principal) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        *session = Some(principal);
    }

    pub fn sign_out(&self) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        *session = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current(&self) -> Option<Principal> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_identity_always_present() {
        let identity = StaticIdentity::new(Principal::new("u1", "u1@example.com"));
        assert_eq!(identity.current().unwrap().uid, "u1");
    }

    #[test]
    fn session_identity_tracks_sign_in_and_out() {
        let identity = SessionIdentity::new();
        assert!(identity.current().is_none());

        identity.sign_in(Principal::new("u2", "u2@example.com"));
        assert_eq!(identity.current().unwrap().email, "u2@example.com");

        identity.sign_out();
        assert!(identity.current().is_none());
    }
}
