pub mod cli;
pub mod fetcher;
pub mod filter;
pub mod logging;
pub mod manager;

pub use cli::{handle_command, IngestArgs};
pub use fetcher::{extract_page, HttpFetcher, PageFetcher};
pub use filter::{passes_keyword_stage, CandidateFilter};
pub use logging::{init_logging, Logger};
pub use manager::{dedup_entries, IngestManager};

pub mod prelude {
    pub use super::fetcher::PageFetcher;
    pub use super::manager::IngestManager;
    pub use rl_core::{HistoryEntry, Result, Error};
}
