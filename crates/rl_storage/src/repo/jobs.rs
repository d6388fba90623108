use std::sync::Arc;
use rl_core::storage::server_timestamp;
use rl_core::{DocumentStore, Job, JobStatus, Result, Scope};
use serde_json::{json, Map};

/// Keyed record of ingestion runs, polled by clients until `complete`.
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn DocumentStore>,
}

impl JobTracker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Register a new job in the `processing` state and return its id
    pub async fn create(&self, user_id: &str) -> Result<String> {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.store
            .set(
                &Scope::jobs(user_id),
                &job_id,
                json!({
                    "status": JobStatus::Processing,
                    "createdAt": server_timestamp(),
                    "newArticleIds": [],
                }),
            )
            .await?;
        Ok(job_id)
    }

    /// The one mutating transition a job goes through
    pub async fn complete(&self, user_id: &str, job_id: &str, new_article_ids: &[String]) -> Result<()> {
        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(JobStatus::Complete));
        patch.insert("newArticleIds".to_string(), json!(new_article_ids));
        patch.insert("completedAt".to_string(), server_timestamp());
        self.store.update(&Scope::jobs(user_id), job_id, patch).await
    }

    pub async fn get(&self, user_id: &str, job_id: &str) -> Result<Option<Job>> {
        match self.store.get(&Scope::jobs(user_id), job_id).await? {
            Some(doc) => Ok(Some(Job::from_document(&doc)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    #[tokio::test]
    async fn test_job_lifecycle() {
        let tracker = JobTracker::new(Arc::new(MemoryStorage::empty()));

        let job_id = tracker.create("alice").await.unwrap();
        let job = tracker.get("alice", &job_id).await.unwrap().unwrap();
        assert_eq!(job.id, job_id);
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.created_at.is_some());
        assert!(job.completed_at.is_none());

        tracker
            .complete("alice", &job_id, &["a1".to_string(), "a2".to_string()])
            .await
            .unwrap();
        let job = tracker.get("alice", &job_id).await.unwrap().unwrap();
        assert!(job.is_complete());
        assert!(job.completed_at.is_some());
        assert_eq!(job.new_article_ids, vec!["a1", "a2"]);

        assert!(tracker.get("bob", &job_id).await.unwrap().is_none());
    }
}
