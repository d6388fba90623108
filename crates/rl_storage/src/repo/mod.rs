mod articles;
mod jobs;
mod profile;
mod recommendations;

pub use articles::{ArticleQuery, ArticleRepository, SearchType, EXISTENCE_CHUNK_SIZE};
pub use jobs::JobTracker;
pub use profile::ProfileRepository;
pub use recommendations::{RecommendationOutcome, RecommendationService, WEEKLY_RECOMMENDATION_ID};
