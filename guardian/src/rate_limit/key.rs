//! Composite rate-limit keys: `<feature>:<user_id>:<client_ip>`.
//!
//! The same user from two IPs, or two users behind one IP, get separate
//! windows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address used when no proxy header carries a client IP.
pub const FALLBACK_CLIENT_IP: &str = "0.0.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateLimitKey {
    pub feature: String,
    pub user_id: String,
    pub client_ip: String,
}

impl RateLimitKey {
    pub fn new(
        feature: impl Into<String>,
        user_id: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Self {
        Self {
            feature: feature.into(),
            user_id: user_id.into(),
            client_ip: client_ip.into(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.feature, self.user_id, self.client_ip)
    }
}

/// Proxy headers that may carry the client address.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIpHeaders<'a> {
    pub cf_connecting_ip: Option<&'a str>,
    pub x_real_ip: Option<&'a str>,
    pub x_forwarded_for: Option<&'a str>,
}

impl ClientIpHeaders<'_> {
    /// Resolve the client IP. Precedence: `cf-connecting-ip`, `x-real-ip`,
    /// then the first hop of `x-forwarded-for`.
    pub fn resolve(&self) -> String {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(ip) = non_empty(self.cf_connecting_ip) {
            return ip.to_string();
        }
        if let Some(ip) = non_empty(self.x_real_ip) {
            return ip.to_string();
        }
        if let Some(first) = non_empty(self.x_forwarded_for).and_then(|v| v.split(',').next()) {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
        FALLBACK_CLIENT_IP.to_string()
    }
}
