use crate::error::{DataError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Ambient per-request state set by the caller: tenant, free-form items and
/// the cancellation signal propagated to adapter calls.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub tenant_id: Option<String>,
    pub items: HashMap<String, String>,
    pub cancellation: CancellationToken,
    pub timeout: Option<Duration>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.insert(key.into(), value.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Run an adapter call, aborting with `Cancelled` when the token fires or
    /// `QueryTimeout` when the timeout elapses first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancellation.is_cancelled() {
            return Err(DataError::Cancelled);
        }

        let run = async {
            match self.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(DataError::QueryTimeout(timeout.as_millis() as u64)),
                },
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(DataError::Cancelled),
            result = run => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_passes_through() {
        let ctx = RequestContext::new();
        let value = ctx.guard(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_guard_cancelled() {
        let ctx = RequestContext::new();
        let token = ctx.cancellation.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result: Result<()> = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        handle.await.unwrap();
        assert!(matches!(result, Err(DataError::Cancelled)));
    }

    #[tokio::test]
    async fn test_guard_timeout() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(5));
        let result: Result<()> = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(DataError::QueryTimeout(5))));
    }

    #[test]
    fn test_context_items() {
        let ctx = RequestContext::new().with_tenant("acme").with_item("role", "admin");
        assert_eq!(ctx.tenant_id.as_deref(), Some("acme"));
        assert_eq!(ctx.item("role"), Some("admin"));
        assert!(!ctx.is_cancelled());
    }
}
