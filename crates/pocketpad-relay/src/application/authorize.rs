//! Session authorization.
//!
//! A client's first frame must be an `auth` command carrying the shared
//! token.  Token verification happens in the server; this module decides
//! what an authenticated session is *entitled* to, which is where licensing
//! policy plugs in without touching the transport.

use async_trait::async_trait;

/// What an authenticated session is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entitlements {
    /// Whether the paired account has a paid license.  Relayed to the
    /// client in the auth acknowledgement so its UI can unlock features.
    pub pro: bool,
}

/// Policy hook consulted once per session, after the token matched.
///
/// Returning `Err` rejects the session with the given human-readable
/// reason; the server relays it verbatim in the auth error message.
#[async_trait]
pub trait SessionAuthorizer: Send + Sync {
    async fn authorize(&self) -> Result<Entitlements, String>;
}

/// Admits every session that presented the correct token.
///
/// This is the default policy for self-hosted relays, where possession of
/// the token is the whole trust model.
#[derive(Debug, Clone, Copy)]
pub struct AlwaysAuthorized {
    pub pro: bool,
}

#[async_trait]
impl SessionAuthorizer for AlwaysAuthorized {
    async fn authorize(&self) -> Result<Entitlements, String> {
        Ok(Entitlements { pro: self.pro })
    }
}

/// Admits sessions only until a fixed deadline, then rejects with an
/// upgrade prompt.  Mirrors a time-limited trial build.
#[derive(Debug, Clone, Copy)]
pub struct TrialAuthorizer {
    /// Unix timestamp (seconds) after which sessions are rejected.
    pub expires_at_secs: u64,
}

#[async_trait]
impl SessionAuthorizer for TrialAuthorizer {
    async fn authorize(&self) -> Result<Entitlements, String> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(u64::MAX);
        if now > self.expires_at_secs {
            Err("Trial expired. Please upgrade to continue.".to_string())
        } else {
            Ok(Entitlements { pro: false })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_authorized_grants_requested_pro_flag() {
        let free = AlwaysAuthorized { pro: false };
        let paid = AlwaysAuthorized { pro: true };

        assert_eq!(free.authorize().await, Ok(Entitlements { pro: false }));
        assert_eq!(paid.authorize().await, Ok(Entitlements { pro: true }));
    }

    #[tokio::test]
    async fn test_trial_authorizer_admits_before_deadline() {
        let authorizer = TrialAuthorizer {
            expires_at_secs: u64::MAX,
        };
        assert_eq!(
            authorizer.authorize().await,
            Ok(Entitlements { pro: false })
        );
    }

    #[tokio::test]
    async fn test_trial_authorizer_rejects_after_deadline_with_reason() {
        let authorizer = TrialAuthorizer { expires_at_secs: 0 };
        let result = authorizer.authorize().await;
        let reason = result.expect_err("expired trial must reject");
        assert!(reason.contains("Trial expired"));
    }
}
