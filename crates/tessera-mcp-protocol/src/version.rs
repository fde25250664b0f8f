//! MCP protocol version support and negotiation.
//!
//! ## Version history
//! - **2025-03-26**: Streamable HTTP transport, OAuth 2.1 authorization
//! - **2025-06-18**: Elicitation, structured `_meta`, cursors, progress tokens
//! - **2025-11-25**: Tasks (durable long-running tool calls), `tasks/*` methods

use serde::{Deserialize, Serialize};

/// Supported MCP protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// Streamable HTTP baseline (2025-03-26)
    #[serde(rename = "2025-03-26")]
    V2025_03_26,
    /// Elicitation, `_meta`, cursor and progress-token support (2025-06-18)
    #[serde(rename = "2025-06-18")]
    V2025_06_18,
    /// Tasks and status notifications (2025-11-25)
    #[serde(rename = "2025-11-25")]
    V2025_11_25,
}

impl ProtocolVersion {
    /// All supported versions, newest first.
    pub const SUPPORTED: [ProtocolVersion; 3] = [
        ProtocolVersion::V2025_11_25,
        ProtocolVersion::V2025_06_18,
        ProtocolVersion::V2025_03_26,
    ];

    /// The most recent version this crate implements.
    pub const LATEST: ProtocolVersion = ProtocolVersion::V2025_11_25;

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2025-03-26" => Some(ProtocolVersion::V2025_03_26),
            "2025-06-18" => Some(ProtocolVersion::V2025_06_18),
            "2025-11-25" => Some(ProtocolVersion::V2025_11_25),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V2025_03_26 => "2025-03-26",
            ProtocolVersion::V2025_06_18 => "2025-06-18",
            ProtocolVersion::V2025_11_25 => "2025-11-25",
        }
    }

    /// Negotiate against the version string a client declared in
    /// `initialize`: an exact match is echoed back, anything else falls
    /// forward to the most recent supported version.
    pub fn negotiate(client_version: &str) -> Self {
        Self::parse(client_version).unwrap_or(Self::LATEST)
    }

    /// Whether this version carries the `tasks/*` method family.
    pub fn supports_tasks(&self) -> bool {
        matches!(self, ProtocolVersion::V2025_11_25)
    }

    /// Whether this version supports structured elicitation.
    pub fn supports_elicitation(&self) -> bool {
        matches!(
            self,
            ProtocolVersion::V2025_06_18 | ProtocolVersion::V2025_11_25
        )
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::LATEST
    }
}
