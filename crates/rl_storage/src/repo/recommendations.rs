use std::collections::BTreeMap;
use std::sync::Arc;
use rand::seq::SliceRandom;
use rand::Rng;
use rl_core::storage::server_timestamp;
use rl_core::{ArticleRecord, Document, DocumentStore, Recommendation, Result, Scope, RECOMMENDATION_SIZE};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

/// Document id of the per-user recommendation singleton.
pub const WEEKLY_RECOMMENDATION_ID: &str = "weekly";

const HIGH_VALUE_TIERS: &[&str] = &["tier-s", "tier-a"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationOutcome {
    Success { recommended_ids: Vec<String> },
    Skipped { reason: String },
}

#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<dyn DocumentStore>,
}

impl RecommendationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Articles rated S/A tier or flagged read-later, deduplicated by id.
    async fn candidates(&self, user_id: &str) -> Result<Vec<Document>> {
        let scope = Scope::articles(user_id);
        let mut candidates = BTreeMap::new();
        for tier in HIGH_VALUE_TIERS {
            for doc in self.store.find_eq(&scope, "reflection.usefulness", &json!(tier)).await? {
                candidates.insert(doc.id.clone(), doc);
            }
        }
        for doc in self.store.find_eq(&scope, "readLater", &json!(true)).await? {
            candidates.insert(doc.id.clone(), doc);
        }
        Ok(candidates.into_values().collect())
    }

    pub async fn generate(&self, user_id: &str) -> Result<RecommendationOutcome> {
        let candidates = self.candidates(user_id).await?;
        let picked = {
            let mut rng = rand::thread_rng();
            pick(&candidates, &mut rng)
        };
        self.store_pick(user_id, picked).await
    }

    /// Same as `generate` with a caller supplied random source.
    pub async fn generate_with_rng<R: Rng + Send>(&self, user_id: &str, rng: &mut R) -> Result<RecommendationOutcome> {
        let candidates = self.candidates(user_id).await?;
        let picked = pick(&candidates, rng);
        self.store_pick(user_id, picked).await
    }

    async fn store_pick(&self, user_id: &str, picked: Option<Vec<String>>) -> Result<RecommendationOutcome> {
        let Some(ids) = picked else {
            info!("  -> Fewer than {} recommendable articles, skipping (User: {})", RECOMMENDATION_SIZE, user_id);
            return Ok(RecommendationOutcome::Skipped {
                reason: "Not enough high-value articles".to_string(),
            });
        };

        self.store
            .set(
                &Scope::recommendations(user_id),
                WEEKLY_RECOMMENDATION_ID,
                json!({"articleIds": ids, "createdAt": server_timestamp()}),
            )
            .await?;
        info!("✅ Saved {} recommended articles (User: {})", ids.len(), user_id);
        Ok(RecommendationOutcome::Success { recommended_ids: ids })
    }

    pub async fn current(&self, user_id: &str) -> Result<Option<Recommendation>> {
        match self.store.get(&Scope::recommendations(user_id), WEEKLY_RECOMMENDATION_ID).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// The recommended articles that still exist, in recommendation order
    pub async fn recommended_articles(&self, user_id: &str) -> Result<Vec<ArticleRecord>> {
        let Some(recommendation) = self.current(user_id).await? else {
            return Ok(Vec::new());
        };
        let scope = Scope::articles(user_id);
        let mut articles = Vec::with_capacity(recommendation.article_ids.len());
        for id in &recommendation.article_ids {
            match self.store.get(&scope, id).await? {
                Some(doc) => articles.push(ArticleRecord::from_document(&doc)?),
                None => warn!("⚠️ Recommended article {} no longer exists", id),
            }
        }
        Ok(articles)
    }
}

fn pick<R: Rng + ?Sized>(candidates: &[Document], rng: &mut R) -> Option<Vec<String>> {
    if candidates.len() < RECOMMENDATION_SIZE {
        return None;
    }
    Some(
        candidates
            .choose_multiple(rng, RECOMMENDATION_SIZE)
            .map(|doc| doc.id.clone())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::Value;
    use std::collections::HashSet;

    async fn seed(store: &Arc<dyn DocumentStore>, id: &str, data: Value) {
        store.set(&Scope::articles("alice"), id, data).await.unwrap();
    }

    fn article(usefulness: Option<&str>, read_later: bool) -> Value {
        let mut data = json!({
            "originalUrl": "https://a.dev",
            "generatedTitle": "t",
            "summary": "s",
            "tags": [],
            "readLater": read_later,
        });
        if let Some(tier) = usefulness {
            data["reflection"] = json!({
                "usefulness": tier,
                "impression": "",
                "specific_impression": "",
                "why_important": "",
                "content_type": "",
                "what_i_got": "",
                "memo": "",
            });
        }
        data
    }

    #[tokio::test]
    async fn test_skips_with_too_few_candidates() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStorage::empty());
        seed(&store, "a", article(Some("tier-s"), true)).await;
        seed(&store, "b", article(Some("tier-b"), false)).await;
        seed(&store, "c", article(None, true)).await;

        let service = RecommendationService::new(store.clone());
        let outcome = service.generate("alice").await.unwrap();
        assert!(matches!(outcome, RecommendationOutcome::Skipped { .. }));
        assert!(service.current("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_picks_three_distinct_candidates() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStorage::empty());
        seed(&store, "a", article(Some("tier-s"), false)).await;
        seed(&store, "b", article(Some("tier-a"), true)).await;
        seed(&store, "c", article(None, true)).await;
        seed(&store, "d", article(Some("tier-c"), false)).await;
        seed(&store, "e", article(Some("tier-a"), false)).await;

        let service = RecommendationService::new(store.clone());
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = service.generate_with_rng("alice", &mut rng).await.unwrap();
        let RecommendationOutcome::Success { recommended_ids } = outcome else {
            panic!("expected a recommendation");
        };

        let unique: HashSet<_> = recommended_ids.iter().cloned().collect();
        assert_eq!(unique.len(), 3);
        assert!(!unique.contains("d"));

        let stored = service.current("alice").await.unwrap().unwrap();
        assert_eq!(stored.article_ids, recommended_ids);
        assert!(stored.created_at.is_some());

        store.delete(&Scope::articles("alice"), &recommended_ids[0]).await.unwrap();
        assert_eq!(service.recommended_articles("alice").await.unwrap().len(), 2);
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome = RecommendationOutcome::Skipped { reason: "x".to_string() };
        assert_eq!(serde_json::to_value(outcome).unwrap(), json!({"status": "skipped", "reason": "x"}));
    }
}
