use std::sync::Arc;
use rl_core::storage::server_timestamp;
use rl_core::{DocumentStore, Result, Scope, UserProfile};
use serde_json::json;

const PROFILE_ID: &str = "profile";

#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create the profile on first sign-in; returns false if it already existed
    pub async fn create_if_missing(&self, user_id: &str, email: &str) -> Result<bool> {
        if self.get(user_id).await?.is_some() {
            return Ok(false);
        }
        self.store
            .set(&Scope::profile(user_id), PROFILE_ID, json!({"email": email, "createdAt": server_timestamp()}))
            .await?;
        Ok(true)
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserProfile>> {
        match self.store.get(&Scope::profile(user_id), PROFILE_ID).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }
}
