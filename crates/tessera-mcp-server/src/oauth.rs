//! The OAuth gate seam.
//!
//! The core never implements OAuth itself; the surrounding application
//! registers a gate and the protocol handler consults it for tools flagged
//! `requires_auth`, forwarding the bearer token the transport extracted.

use async_trait::async_trait;

use tessera_mcp_protocol::McpResult;

/// Outcome of validating a bearer token.
#[derive(Debug, Clone, Default)]
pub struct OAuthDecision {
    pub authorized: bool,
    pub user_id: Option<String>,
    /// Token for the upstream provider, injected into the tool context.
    pub external_access_token: Option<String>,
    /// Populated when `authorized` is false.
    pub reason: Option<String>,
}

impl OAuthDecision {
    pub fn allow(user_id: impl Into<String>, external_access_token: impl Into<String>) -> Self {
        Self {
            authorized: true,
            user_id: Some(user_id.into()),
            external_access_token: Some(external_access_token.into()),
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            user_id: None,
            external_access_token: None,
            reason: Some(reason.into()),
        }
    }
}

/// Validates bearer tokens for tools that require authorization.
#[async_trait]
pub trait OAuthGate: Send + Sync {
    async fn validate(&self, token: &str, scopes: &[String]) -> McpResult<OAuthDecision>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tessera_mcp_protocol::McpError;

    /// A gate with canned behavior for protocol-handler tests.
    pub struct StaticGate {
        pub decision: Option<OAuthDecision>,
    }

    #[async_trait]
    impl OAuthGate for StaticGate {
        async fn validate(&self, _token: &str, _scopes: &[String]) -> McpResult<OAuthDecision> {
            self.decision
                .clone()
                .ok_or_else(|| McpError::Internal("gate blew up".to_string()))
        }
    }
}
