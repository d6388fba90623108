use std::collections::BTreeMap;
use rl_core::{canonical_tag, ArticleDraft, HistoryEntry, InferenceModel, ScrapeResult, MAX_TAGS, TAG_VOCABULARY};
use thiserror::Error;
use tracing::{info, warn};
use crate::truncate_chars;

/// Characters of page text included in the summary prompt.
pub const SUMMARY_CONTENT_CHARS: usize = 1500;

const TITLE_LABEL: &str = "タイトル";
const SOURCE_LABEL: &str = "情報元";
const SUMMARY_LABEL: &str = "要約";
const TAGS_LABEL: &str = "タグ";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Model call failed: {0}")]
    Model(#[from] rl_core::Error),
    #[error("Summary is missing the '{0}' field")]
    MissingField(&'static str),
}

fn summary_prompt(entry: &HistoryEntry, content: &str) -> String {
    format!(
        "以下のWebサイトの内容を要約してください:\n\
         タイトル: {title}\n\
         URL: {url}\n\
         コンテンツ: {content}...\n\
         必ず下記のフォーマットに従って記述してください。\n\
         タイトル:（ここにAIが生成した、内容が分かりやすいタイトルを記載）\n\
         情報元:（ここにURLではなく、Webサイト名やサービス名を記載）\n\
         要約:（サイト内容をIT技術の観点から一言で要約してください。タグ用語を必ず含めて、である調で記述してください。太字などはなしでシンプルなテキストで書いてください。）\n\
         タグ:（重要：必ず下記の「タグリスト」の中から、内容に最も関連する単語を{max_tags}つだけ選んでください。リストにない単語は絶対に使用しないでください。）\n\
         タグリスト: {vocabulary}",
        title = entry.title,
        url = entry.url,
        content = truncate_chars(content, SUMMARY_CONTENT_CHARS),
        max_tags = MAX_TAGS,
        vocabulary = TAG_VOCABULARY.join(", "),
    )
}

/// Splits `line` at the first ASCII or full-width colon.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(|c| c == ':' || c == '：')?;
    let sep_len = line[idx..].chars().next().map_or(1, char::len_utf8);
    Some((line[..idx].trim(), line[idx + sep_len..].trim()))
}

fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(|c| c == ',' || c == '、').filter_map(canonical_tag) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}

/// Parses the labelled response of the summary prompt into a draft.
///
/// Title, summary and at least one vocabulary tag are required; the source line is optional.
/// A repeated label overwrites the earlier one.
pub fn parse_summary(
    text: &str,
    entry: &HistoryEntry,
    ogp: &BTreeMap<String, String>,
) -> Result<ArticleDraft, SummaryError> {
    let mut generated_title = None;
    let mut source = None;
    let mut summary = None;
    let mut tags = None;

    for (label, value) in text.lines().filter_map(split_label) {
        match label {
            TITLE_LABEL => generated_title = Some(value.to_string()),
            SOURCE_LABEL => source = Some(value.to_string()),
            SUMMARY_LABEL => summary = Some(value.to_string()),
            TAGS_LABEL => tags = Some(parse_tags(value)),
            _ => {}
        }
    }

    let generated_title = generated_title
        .filter(|t| !t.is_empty())
        .ok_or(SummaryError::MissingField("generatedTitle"))?;
    let summary = summary
        .filter(|s| !s.is_empty())
        .ok_or(SummaryError::MissingField("summary"))?;
    let tags = tags
        .filter(|t| !t.is_empty())
        .ok_or(SummaryError::MissingField("tags"))?;

    Ok(ArticleDraft {
        original_url: entry.url.clone(),
        original_title: entry.title.clone(),
        generated_title,
        source: source.filter(|s| !s.is_empty()),
        summary,
        tags,
        ogp: ogp.clone(),
    })
}

/// Summarizes one scraped page. Errors are logged here; callers only need to drop the entry.
pub async fn summarize_entry(
    model: &dyn InferenceModel,
    entry: &HistoryEntry,
    scrape: &ScrapeResult,
) -> Result<ArticleDraft, SummaryError> {
    let response = model
        .generate(&summary_prompt(entry, &scrape.text))
        .await
        .map_err(|e| {
            warn!("  -> 🚨 Summary with {} failed for {}: {}", model.name(), entry.url, e);
            SummaryError::from(e)
        })?;

    match parse_summary(&response, entry, &scrape.ogp) {
        Ok(draft) => {
            info!("  -> 📝 Summarized: {}", draft.generated_title);
            Ok(draft)
        }
        Err(e) => {
            warn!("  -> ⚠️ Malformed summary for {}: {}", entry.title, e);
            Err(e)
        }
    }
}
