use std::sync::Arc;
use rl_core::{InferenceModel, ScrapeResult};
use rl_inference::classify_content;
use crate::fetcher::is_http_url;

/// Pages with less extracted text than this are never sent to the model.
pub const MIN_CONTENT_CHARS: usize = 100;

const TECH_KEYWORDS: &[&str] = &[
    "技術", "IT", "プログラミング", "エンジニア", "開発", "API", "AI", "人工知能", "Python",
    "JavaScript", "プログラム", "システム", "ソフトウェア", "ハードウェア", "クラウド", "サーバ",
    "データ", "ネットワーク", "セキュリティ", "Web技術", "IT技術", "Google", "Chrome", "Takeout",
    "GitHub", "コード", "ML", "機械学習", "Deep Learning", "チュートリアル", "基礎", "HTML", "CSS",
    "React", "フロントエンド", "バックエンド",
];

const EXCLUDED_KEYWORDS: &[&str] = &[
    "ホーム", "トップ", "home", "drive", "mail", "inbox", "login", "signin", "sign in", "検索結果",
    "Google cloud", "Google 検索",
];

/// Google hosts that still publish technical material.
const GOOGLE_ALLOWED: &[&str] = &["developers.google.com", "cloud.google.com/blog"];

fn contains_any(haystacks: &[&str], needles: &[&str]) -> bool {
    needles.iter().any(|needle| {
        let needle = needle.to_lowercase();
        haystacks.iter().any(|h| h.contains(&needle))
    })
}

/// Cheap first stage: URL scheme, keyword allow/deny lists and the Google account pages rule.
pub fn passes_keyword_stage(title: &str, url: &str) -> bool {
    if !is_http_url(url) {
        return false;
    }
    let title_lower = title.to_lowercase();
    let url_lower = url.to_lowercase();
    let haystacks = [title_lower.as_str(), url_lower.as_str()];

    if !contains_any(&haystacks, TECH_KEYWORDS) || contains_any(&haystacks, EXCLUDED_KEYWORDS) {
        return false;
    }
    !(url.contains(".google.com") && !GOOGLE_ALLOWED.iter().any(|allowed| url.contains(allowed)))
}

/// Model backed second stage.
#[derive(Clone)]
pub struct CandidateFilter {
    model: Arc<dyn InferenceModel>,
}

impl CandidateFilter {
    pub fn new(model: Arc<dyn InferenceModel>) -> Self {
        Self { model }
    }

    pub async fn admit(&self, scrape: &ScrapeResult) -> bool {
        if scrape.text.chars().count() < MIN_CONTENT_CHARS {
            return false;
        }
        classify_content(self.model.as_ref(), &scrape.text).await
    }
}
