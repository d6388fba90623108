use std::collections::HashSet;
use std::sync::Arc;
use rl_core::storage::server_timestamp;
use rl_core::{ArticleDraft, ArticleRecord, DocumentStore, Error, Reflection, Result, Scope, WriteBatch};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, warn};

/// URLs per existence query; the store rejects larger `find_in` sets.
pub const EXISTENCE_CHUNK_SIZE: usize = rl_core::storage::MAX_IN_QUERY_VALUES;

/// Tag filter value selecting articles flagged for later reading.
const READ_LATER_FILTER: &str = "readLater";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Tag,
    Title,
    Reflection,
    #[default]
    #[serde(other)]
    All,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleQuery {
    /// A tag, or `readLater`
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default, rename = "q")]
    pub keyword: Option<String>,
    #[serde(default)]
    pub search_type: SearchType,
}

impl ArticleQuery {
    pub fn matches(&self, article: &ArticleRecord) -> bool {
        match self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(keyword) => keyword_matches(article, &keyword.to_lowercase(), self.search_type),
            None => true,
        }
    }
}

fn keyword_matches(article: &ArticleRecord, keyword: &str, search_type: SearchType) -> bool {
    let draft = &article.draft;
    let generated_title = draft.generated_title.to_lowercase();
    let original_title = draft.original_title.to_lowercase();
    let in_tags = || draft.tags.iter().any(|tag| tag.to_lowercase().contains(keyword));
    let reflection_text = article
        .reflection
        .as_ref()
        .map(Reflection::searchable_text)
        .unwrap_or_default();

    match search_type {
        SearchType::Tag => in_tags(),
        SearchType::Title => generated_title.contains(keyword) || original_title.contains(keyword),
        SearchType::Reflection => reflection_text.contains(keyword),
        SearchType::All => {
            let summary = draft.summary.to_lowercase();
            let corpus = [
                generated_title.as_str(),
                original_title.as_str(),
                summary.as_str(),
                reflection_text.as_str(),
            ]
            .concat();
            corpus.contains(keyword) || in_tags()
        }
    }
}

#[derive(Clone)]
pub struct ArticleRepository {
    store: Arc<dyn DocumentStore>,
}

impl ArticleRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Which of `urls` are already stored for the user. A failing chunk is
    /// logged and contributes nothing, so its URLs get processed again.
    pub async fn existing_urls(&self, user_id: &str, urls: &[String]) -> HashSet<String> {
        let scope = Scope::articles(user_id);
        let mut existing = HashSet::new();
        for chunk in urls.chunks(EXISTENCE_CHUNK_SIZE) {
            match self.store.find_in(&scope, "originalUrl", chunk).await {
                Ok(docs) => existing.extend(
                    docs.iter()
                        .filter_map(|doc| doc.field("originalUrl").and_then(Value::as_str))
                        .map(str::to_string),
                ),
                Err(e) => warn!("⚠️ Existence check failed for {} URLs: {}", chunk.len(), e),
            }
        }
        existing
    }

    /// Store all drafts in one atomic batch and return the new ids in draft order
    pub async fn insert_batch(&self, user_id: &str, drafts: &[ArticleDraft]) -> Result<Vec<String>> {
        let scope = Scope::articles(user_id);
        let mut batch = WriteBatch::new();
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = self.store.new_id();
            let mut data = serde_json::to_value(draft)?;
            if let Value::Object(map) = &mut data {
                map.insert("createdAt".to_string(), server_timestamp());
                map.insert("readLater".to_string(), json!(false));
            }
            batch.set(scope.clone(), id.clone(), data);
            ids.push(id);
        }
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(ids)
    }

    pub async fn get(&self, user_id: &str, article_id: &str) -> Result<Option<ArticleRecord>> {
        match self.store.get(&Scope::articles(user_id), article_id).await? {
            Some(doc) => Ok(Some(ArticleRecord::from_document(&doc)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, user_id: &str, article_id: &str) -> Result<()> {
        let scope = Scope::articles(user_id);
        if self.store.get(&scope, article_id).await?.is_none() {
            return Err(Error::NotFound(format!("{}/{}", scope, article_id)));
        }
        self.store.delete(&scope, article_id).await
    }

    pub async fn save_reflection(&self, user_id: &str, article_id: &str, reflection: &Reflection) -> Result<()> {
        let mut patch = Map::new();
        patch.insert("reflection".to_string(), serde_json::to_value(reflection)?);
        patch.insert("updatedAt".to_string(), server_timestamp());
        self.store.update(&Scope::articles(user_id), article_id, patch).await
    }

    /// Flip the read-later flag and return its new value
    pub async fn toggle_read_later(&self, user_id: &str, article_id: &str) -> Result<bool> {
        let scope = Scope::articles(user_id);
        let doc = self
            .store
            .get(&scope, article_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{}/{}", scope, article_id)))?;
        let read_later = !doc.field("readLater").and_then(Value::as_bool).unwrap_or(false);

        let mut patch = Map::new();
        patch.insert("readLater".to_string(), json!(read_later));
        self.store.update(&scope, article_id, patch).await?;
        Ok(read_later)
    }

    /// Articles matching the query, newest first
    pub async fn search(&self, user_id: &str, query: &ArticleQuery) -> Result<Vec<ArticleRecord>> {
        let scope = Scope::articles(user_id);
        let filter = query.filter.as_deref().map(str::trim).filter(|f| !f.is_empty());
        let documents = match filter {
            Some(READ_LATER_FILTER) => self.store.find_eq(&scope, "readLater", &json!(true)).await?,
            _ => self.store.list(&scope).await?,
        };

        let mut articles = Vec::with_capacity(documents.len());
        for doc in &documents {
            match ArticleRecord::from_document(doc) {
                Ok(article) => articles.push(article),
                Err(e) => error!("❌ Skipping unreadable article {}: {}", doc.id, e),
            }
        }

        if let Some(tag) = filter.filter(|f| *f != READ_LATER_FILTER) {
            articles.retain(|a| a.draft.tags.iter().any(|t| t == tag));
        }
        articles.retain(|a| query.matches(a));
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(articles)
    }
}
