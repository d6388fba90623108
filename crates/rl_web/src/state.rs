use std::sync::Arc;
use rl_core::{DocumentStore, IdentityVerifier};
use rl_scrapers::IngestManager;
use rl_storage::{ArticleRepository, JobTracker, ProfileRepository, RecommendationService};

pub struct AppState {
    pub ingest: IngestManager,
    pub articles: ArticleRepository,
    pub jobs: JobTracker,
    pub recommendations: RecommendationService,
    pub profiles: ProfileRepository,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, ingest: IngestManager, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            ingest,
            articles: ArticleRepository::new(store.clone()),
            jobs: JobTracker::new(store.clone()),
            recommendations: RecommendationService::new(store.clone()),
            profiles: ProfileRepository::new(store),
            verifier,
        }
    }
}
