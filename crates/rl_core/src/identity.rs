use async_trait::async_trait;
use crate::Result;

/// Turns a bearer credential into a stable user id.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String>;
}
