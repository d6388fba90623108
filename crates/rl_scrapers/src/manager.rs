use std::collections::HashSet;
use std::sync::Arc;
use futures::stream::{FuturesUnordered, StreamExt};
use rl_core::config::AppConfig;
use rl_core::{ArticleDraft, DocumentStore, HistoryEntry, InferenceModel, Result};
use rl_inference::summarize_entry;
use rl_storage::{ArticleRepository, JobTracker};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::filter::{passes_keyword_stage, CandidateFilter};
use crate::logging::Logger;

pub const DEFAULT_WORKERS: usize = 5;

/// Runs browsing-history ingestion jobs: dedup, skip known URLs, then
/// fetch, filter and summarize in parallel before one batch write.
#[derive(Clone)]
pub struct IngestManager {
    articles: ArticleRepository,
    jobs: JobTracker,
    fetcher: Arc<dyn PageFetcher>,
    model: Arc<dyn InferenceModel>,
    workers: usize,
}

impl IngestManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        fetcher: Arc<dyn PageFetcher>,
        model: Arc<dyn InferenceModel>,
    ) -> Self {
        Self {
            articles: ArticleRepository::new(store.clone()),
            jobs: JobTracker::new(store),
            fetcher,
            model,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn DocumentStore>,
        model: Arc<dyn InferenceModel>,
    ) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);
        Ok(Self::new(store, fetcher, model).with_workers(config.workers))
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    /// Registers a job and processes `entries` in a detached task.
    /// The job id is returned as soon as the job record exists.
    pub async fn submit(&self, user_id: &str, entries: Vec<HistoryEntry>) -> Result<(String, JoinHandle<Vec<String>>)> {
        let job_id = self.jobs.create(user_id).await?;
        let manager = self.clone();
        let user = user_id.to_string();
        let job = job_id.clone();
        let handle = tokio::spawn(async move { manager.run(&user, &job, entries).await });
        Ok((job_id, handle))
    }

    /// Processes one job to completion and returns the ids of the stored articles.
    /// Never fails: every problem is logged and the job still ends up `complete`.
    pub async fn run(&self, user_id: &str, job_id: &str, entries: Vec<HistoryEntry>) -> Vec<String> {
        let logger = Logger::new()
            .with_prefix(format!("[{}]", user_id))
            .with_prefix(format!("[job {}]", short_id(job_id)));
        logger.info("📥 Processing browsing history");

        let new_ids = self.ingest(user_id, entries, &logger).await;

        match self.jobs.complete(user_id, job_id, &new_ids).await {
            Ok(()) => logger.info(&format!("✅ Job complete, {} new articles", new_ids.len())),
            Err(e) => logger.error(&format!("❌ Failed to update job: {}", e)),
        }
        new_ids
    }

    async fn ingest(&self, user_id: &str, entries: Vec<HistoryEntry>, logger: &Logger) -> Vec<String> {
        let candidates = dedup_entries(entries);
        if candidates.is_empty() {
            logger.info("No URLs to process");
            return Vec::new();
        }
        logger.info(&format!("🔗 {} unique URLs in history", candidates.len()));

        let urls: Vec<String> = candidates.iter().map(|e| e.url.clone()).collect();
        let existing = self.articles.existing_urls(user_id, &urls).await;
        if !existing.is_empty() {
            logger.info(&format!("⏭️ {} URLs already stored, skipping", existing.len()));
        }
        let pending: Vec<HistoryEntry> = candidates
            .into_iter()
            .filter(|e| !existing.contains(&e.url))
            .collect();
        if pending.is_empty() {
            logger.info("No new articles to process");
            return Vec::new();
        }

        logger.info(&format!("🦗 Processing {} new URLs with {} workers", pending.len(), self.workers));
        let drafts = self.process_all(pending, logger).await;
        if drafts.is_empty() {
            logger.info("No technical articles found");
            return Vec::new();
        }

        match self.articles.insert_batch(user_id, &drafts).await {
            Ok(ids) => {
                logger.info(&format!("💾 Stored {} articles", ids.len()));
                ids
            }
            Err(e) => {
                logger.error(&format!("❌ Batch write of {} articles failed: {}", drafts.len(), e));
                Vec::new()
            }
        }
    }

    async fn process_all(&self, entries: Vec<HistoryEntry>, logger: &Logger) -> Vec<ArticleDraft> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let filter = CandidateFilter::new(self.model.clone());

        let mut tasks: FuturesUnordered<_> = entries
            .into_iter()
            .map(|entry| {
                let semaphore = semaphore.clone();
                let fetcher = self.fetcher.clone();
                let model = self.model.clone();
                let filter = filter.clone();
                let logger = logger.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    process_entry(fetcher.as_ref(), &filter, model.as_ref(), &entry, &logger).await
                })
            })
            .collect();

        let mut drafts = Vec::new();
        while let Some(result) = tasks.next().await {
            match result {
                Ok(Some(draft)) => drafts.push(draft),
                Ok(None) => {}
                Err(e) => logger.error(&format!("Worker task failed: {}", e)),
            }
        }
        drafts
    }
}

/// Fetch, filter and summarize one entry. `None` means the entry was dropped.
async fn process_entry(
    fetcher: &dyn PageFetcher,
    filter: &CandidateFilter,
    model: &dyn InferenceModel,
    entry: &HistoryEntry,
    logger: &Logger,
) -> Option<ArticleDraft> {
    if !passes_keyword_stage(&entry.title, &entry.url) {
        return None;
    }
    let scrape = fetcher.fetch(&entry.url).await?;
    if !filter.admit(&scrape).await {
        logger.debug(&format!("  -> ❌ Not a technical article: {}", entry.title));
        return None;
    }
    logger.info(&format!("  -> ✅ Technical article: {}", entry.title));
    match summarize_entry(model, entry, &scrape).await {
        Ok(draft) => Some(draft),
        Err(e) => {
            logger.warn(&format!("  -> ⚠️ Summary failed for {}: {}", entry.url, e));
            None
        }
    }
}

/// Keeps the first entry seen for every non-empty URL, in input order.
pub fn dedup_entries(entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.url.is_empty() && seen.insert(e.url.clone()))
        .collect()
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rl_core::{Document, Error, JobStatus, Scope, ScrapeResult, WriteBatch};
    use rl_storage::MemoryStorage;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct MockInference;

    #[async_trait]
    impl InferenceModel for MockInference {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            if prompt.contains("分類してください") {
                Ok("technical".to_string())
            } else {
                Ok("タイトル: Generated\n情報元: Example\n要約: Rustの記事である。\nタグ: Rust, Linux".to_string())
            }
        }
    }

    #[derive(Default)]
    struct StubFetcher {
        fetched: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn count(&self) -> usize {
            self.fetched.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Option<ScrapeResult> {
            self.fetched.lock().unwrap().push(url.to_string());
            if url.contains("offline") {
                return None;
            }
            Some(ScrapeResult {
                text: "Rust programming ".repeat(20),
                ogp: Default::default(),
            })
        }
    }

    /// Records how many fetches are in flight at once.
    #[derive(Default)]
    struct SlowFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for SlowFetcher {
        async fn fetch(&self, _url: &str) -> Option<ScrapeResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            None
        }
    }

    /// Delegates to memory storage but refuses every batch commit.
    struct FailingCommitStore {
        inner: MemoryStorage,
        find_calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for FailingCommitStore {
        fn name(&self) -> &str {
            "failing"
        }

        async fn get(&self, scope: &Scope, id: &str) -> Result<Option<Document>> {
            self.inner.get(scope, id).await
        }

        async fn set(&self, scope: &Scope, id: &str, data: Value) -> Result<()> {
            self.inner.set(scope, id, data).await
        }

        async fn update(&self, scope: &Scope, id: &str, patch: Map<String, Value>) -> Result<()> {
            self.inner.update(scope, id, patch).await
        }

        async fn delete(&self, scope: &Scope, id: &str) -> Result<()> {
            self.inner.delete(scope, id).await
        }

        async fn list(&self, scope: &Scope) -> Result<Vec<Document>> {
            self.inner.list(scope).await
        }

        async fn find_eq(&self, scope: &Scope, path: &str, value: &Value) -> Result<Vec<Document>> {
            self.inner.find_eq(scope, path, value).await
        }

        async fn find_in(&self, scope: &Scope, path: &str, values: &[String]) -> Result<Vec<Document>> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_in(scope, path, values).await
        }

        async fn commit(&self, _batch: WriteBatch) -> Result<()> {
            Err(Error::Storage("commit rejected".to_string()))
        }
    }

    fn manager(store: Arc<dyn DocumentStore>, fetcher: Arc<StubFetcher>) -> IngestManager {
        IngestManager::new(store, fetcher, Arc::new(MockInference)).with_workers(2)
    }

    fn history() -> Vec<HistoryEntry> {
        vec![
            HistoryEntry::new("Python入門", "https://example.dev/a"),
            HistoryEntry::new("Python入門 (dup)", "https://example.dev/a"),
            HistoryEntry::new("Rust API", "https://example.dev/b"),
            HistoryEntry::new("No url", ""),
        ]
    }

    #[test]
    fn test_dedup_keeps_first_entry() {
        let deduped = dedup_entries(history());
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "Python入門");
        assert_eq!(deduped[1].url, "https://example.dev/b");
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStorage::empty());
        let fetcher = Arc::new(StubFetcher::default());
        let manager = manager(store.clone(), fetcher.clone());

        let (job_id, handle) = manager.submit("alice", history()).await.unwrap();
        let new_ids = handle.await.unwrap();
        assert_eq!(new_ids.len(), 2);
        assert_eq!(fetcher.count(), 2);

        let job = manager.jobs().get("alice", &job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.new_article_ids.len(), 2);

        let stored = store.list(&Scope::articles("alice")).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].data["generatedTitle"], "Generated");
        assert_eq!(stored[0].data["readLater"], false);

        let (job_id, handle) = manager.submit("alice", history()).await.unwrap();
        assert!(handle.await.unwrap().is_empty());
        assert_eq!(fetcher.count(), 2);
        let job = manager.jobs().get("alice", &job_id).await.unwrap().unwrap();
        assert!(job.is_complete());
        assert!(job.new_article_ids.is_empty());
    }

    #[tokio::test]
    async fn test_no_candidates_completes_without_workers() {
        let store = Arc::new(FailingCommitStore {
            inner: MemoryStorage::empty(),
            find_calls: AtomicUsize::new(0),
        });
        let fetcher = Arc::new(StubFetcher::default());
        let manager = manager(store.clone(), fetcher.clone());

        let (job_id, handle) = manager
            .submit("alice", vec![HistoryEntry::new("empty", "")])
            .await
            .unwrap();
        assert!(handle.await.unwrap().is_empty());
        assert_eq!(fetcher.count(), 0);
        assert_eq!(store.find_calls.load(Ordering::SeqCst), 0);

        let job = manager.jobs().get("alice", &job_id).await.unwrap().unwrap();
        assert!(job.is_complete());
        assert!(job.new_article_ids.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_entries_are_dropped() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStorage::empty());
        let fetcher = Arc::new(StubFetcher::default());
        let manager = manager(store.clone(), fetcher.clone());

        let entries = vec![
            HistoryEntry::new("ホーム", "https://example.dev/python"),
            HistoryEntry::new("Python offline", "https://offline.example.dev/python"),
            HistoryEntry::new("Python docs", "https://example.dev/python-docs"),
        ];
        let new_ids = manager.run("alice", "job-1", entries).await;
        assert_eq!(new_ids.len(), 1);
        assert_eq!(fetcher.count(), 2);
    }

    #[tokio::test]
    async fn test_commit_failure_completes_with_no_articles() {
        let store = Arc::new(FailingCommitStore {
            inner: MemoryStorage::empty(),
            find_calls: AtomicUsize::new(0),
        });
        let fetcher = Arc::new(StubFetcher::default());
        let manager = manager(store.clone(), fetcher.clone());

        let (job_id, handle) = manager.submit("alice", history()).await.unwrap();
        assert!(handle.await.unwrap().is_empty());
        assert_eq!(fetcher.count(), 2);

        let job = manager.jobs().get("alice", &job_id).await.unwrap().unwrap();
        assert!(job.is_complete());
        assert!(job.new_article_ids.is_empty());
        assert!(store.list(&Scope::articles("alice")).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_fetches_never_exceed_worker_count() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStorage::empty());
        let fetcher = Arc::new(SlowFetcher::default());
        let manager = IngestManager::new(store, fetcher.clone(), Arc::new(MockInference));

        let entries = (0..40)
            .map(|i| HistoryEntry::new(format!("Rust guide {}", i), format!("https://example.dev/{}", i)))
            .collect();
        assert!(manager.run("alice", "job-1", entries).await.is_empty());

        let peak = fetcher.peak.load(Ordering::SeqCst);
        assert!(peak >= 1);
        assert!(peak <= DEFAULT_WORKERS, "{} fetches ran at once", peak);
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
