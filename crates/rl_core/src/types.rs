use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use crate::storage::Document;
use crate::Result;

/// Closed set of tags the summarizer may attach to an article.
pub const TAG_VOCABULARY: &[&str] = &[
    "サーバー", "ネットワーク", "HTML", "CSS", "JavaScript", "Java", "Python", "PHP", "Ruby", "Rust",
    "swift", "C言語", "C#", "C++", "TypeScript", "Go", "サーバーレス", "データベース", "LLM", "Linux",
    "Windows", "MacOS", "OS", "クラウド", "AWS", "Azure", "GCP", "Docker", "フレームワーク",
    "ライブラリ", "API", "JSON", "SQL", "NoSQL", "Git", "Github", "AI", "UI/UX", "Cloud",
    "セキュリティ", "フロントエンド", "バックエンド", "Web3",
];

/// Maximum number of tags kept on an article.
pub const MAX_TAGS: usize = 2;

/// Maps a raw tag onto its vocabulary spelling, ignoring ASCII case.
pub fn canonical_tag(raw: &str) -> Option<&'static str> {
    let raw = raw.trim();
    TAG_VOCABULARY.iter().copied().find(|tag| tag.eq_ignore_ascii_case(raw))
}

/// One line of an uploaded browsing history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
}

/// Browser exports write `null` for untitled pages; treat it like a missing field.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl HistoryEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeResult {
    pub text: String,
    pub ogp: BTreeMap<String, String>,
}

/// Summarized article before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDraft {
    pub original_url: String,
    #[serde(default)]
    pub original_title: String,
    pub generated_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ogp: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    pub usefulness: String,
    pub impression: String,
    pub specific_impression: String,
    pub why_important: String,
    pub content_type: String,
    pub what_i_got: String,
    pub memo: String,
}

impl Reflection {
    /// Free text fields concatenated, lowercased, for keyword search.
    pub fn searchable_text(&self) -> String {
        [
            self.specific_impression.as_str(),
            self.why_important.as_str(),
            self.what_i_got.as_str(),
            self.memo.as_str(),
        ]
        .concat()
        .to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub draft: ArticleDraft,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read_later: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<Reflection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ArticleRecord {
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut record: Self = doc.decode()?;
        record.id = doc.id.clone();
        Ok(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub new_article_ids: Vec<String>,
}

impl Job {
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut job: Self = doc.decode()?;
        job.id = doc.id.clone();
        Ok(job)
    }

    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Complete
    }
}

/// Number of articles picked for a weekly recommendation.
pub const RECOMMENDATION_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub article_ids: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
