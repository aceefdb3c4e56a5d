//! Operator authorization.
//!
//! Every route except `/v1/health` names the permission it needs; the gate
//! decides per request from the headers alone.

use axum::http::{header::AUTHORIZATION, HeaderMap};

pub const PERM_READ: &str = "order_sync:read";
pub const PERM_RUN: &str = "order_sync:run";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRefusal {
    pub reason: String,
}

pub trait OperatorGate: Send + Sync {
    fn authorize(&self, headers: &HeaderMap, permission: &str) -> Result<(), GateRefusal>;
}

/// Grants every permission to requests carrying `Authorization: Bearer <token>`.
pub struct BearerTokenGate {
    token: String,
}

impl BearerTokenGate {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerTokenGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenGate")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl OperatorGate for BearerTokenGate {
    fn authorize(&self, headers: &HeaderMap, permission: &str) -> Result<(), GateRefusal> {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            None => Err(GateRefusal {
                reason: format!("missing bearer token for {permission}"),
            }),
            Some(t) if t.is_empty() || t != self.token => Err(GateRefusal {
                reason: format!("operator token not accepted for {permission}"),
            }),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_auth(v: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        h
    }

    #[test]
    fn bearer_gate_checks_token() {
        let gate = BearerTokenGate::new("s3cret");
        assert!(gate.authorize(&with_auth("Bearer s3cret"), PERM_RUN).is_ok());
        assert!(gate.authorize(&with_auth("Bearer nope"), PERM_RUN).is_err());
        assert!(gate.authorize(&with_auth("s3cret"), PERM_READ).is_err());
        let refused = gate.authorize(&HeaderMap::new(), PERM_READ).unwrap_err();
        assert!(refused.reason.contains(PERM_READ));
    }

    #[test]
    fn debug_redacts_token() {
        let dbg = format!("{:?}", BearerTokenGate::new("s3cret"));
        assert!(!dbg.contains("s3cret"));
    }
}
