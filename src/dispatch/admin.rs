use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, warn};

/// Looks up whether a user holds an admin role in a chat.
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn is_admin(&self, chat: i64, user: u64) -> Result<bool>;
}

/// Result of one admin check. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCheck {
    Admin,
    NotAdmin,
    /// The lookup itself failed; treated as not authorized.
    LookupFailed(String),
}

impl AdminCheck {
    pub fn is_admin(&self) -> bool {
        matches!(self, AdminCheck::Admin)
    }
}

/// One membership lookup per call.
pub async fn authorize(lookup: &dyn MembershipLookup, chat: i64, user: u64) -> AdminCheck {
    match lookup.is_admin(chat, user).await {
        Ok(true) => AdminCheck::Admin,
        Ok(false) => {
            warn!(chat, user, "Admin command denied: user is not an admin");
            AdminCheck::NotAdmin
        }
        Err(e) => {
            error!(chat, user, "Admin check failed: {:#}", e);
            AdminCheck::LookupFailed(format!("{:#}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        answer: Option<bool>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MembershipLookup for Fixed {
        async fn is_admin(&self, _chat: i64, _user: u64) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .ok_or_else(|| anyhow::anyhow!("Bad Request: chat not found"))
        }
    }

    fn fixed(answer: Option<bool>) -> Fixed {
        Fixed {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_admin() {
        let lookup = fixed(Some(true));
        let check = authorize(&lookup, -100, 7).await;
        assert_eq!(check, AdminCheck::Admin);
        assert!(check.is_admin());
    }

    #[tokio::test]
    async fn test_not_admin() {
        let lookup = fixed(Some(false));
        let check = authorize(&lookup, -100, 7).await;
        assert_eq!(check, AdminCheck::NotAdmin);
        assert!(!check.is_admin());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_distinct_and_denied() {
        let lookup = fixed(None);
        let check = authorize(&lookup, -100, 7).await;
        assert_eq!(
            check,
            AdminCheck::LookupFailed("Bad Request: chat not found".to_string())
        );
        assert!(!check.is_admin());
    }

    #[tokio::test]
    async fn test_every_call_performs_a_lookup() {
        let lookup = fixed(Some(true));
        authorize(&lookup, 1, 2).await;
        authorize(&lookup, 1, 2).await;
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }
}
