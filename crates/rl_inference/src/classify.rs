use rl_core::InferenceModel;
use tracing::{debug, warn};
use crate::truncate_chars;

/// Characters of page text shown to the model when classifying.
pub const CLASSIFY_SNIPPET_CHARS: usize = 1000;

fn classification_prompt(snippet: &str) -> String {
    format!(
        "以下の文章は「IT技術解説の記事」か「IT無関係の記事」かを分類してください。\n\
         文章: {snippet}\n\
         「IT技術解説」の場合は technical、「IT無関係」の場合は none とだけ答えてください。\n\
         情報サイトのTOP場合もnoneと答えてください。"
    )
}

/// Asks the model whether `text` is a technical article.
///
/// Fails closed: a model error or an unexpected answer both count as "not technical".
pub async fn classify_content(model: &dyn InferenceModel, text: &str) -> bool {
    let prompt = classification_prompt(truncate_chars(text, CLASSIFY_SNIPPET_CHARS));
    match model.generate(&prompt).await {
        Ok(answer) => {
            let answer = answer.trim().to_lowercase();
            debug!("{} classified snippet as '{}'", model.name(), answer);
            answer.contains("technical")
        }
        Err(e) => {
            warn!("Classification with {} failed: {}", model.name(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rl_core::{Error, Result};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct MockModel {
        answer: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockModel {
        fn answering(answer: Option<&'static str>) -> Self {
            Self { answer, prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl InferenceModel for MockModel {
        fn name(&self) -> &str {
            "Mock"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer
                .map(str::to_string)
                .ok_or_else(|| Error::Inference("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_answer_matching() {
        assert!(classify_content(&MockModel::answering(Some("  Technical\n")), "text").await);
        assert!(!classify_content(&MockModel::answering(Some("none")), "text").await);
        assert!(!classify_content(&MockModel::answering(None), "text").await);
    }

    #[tokio::test]
    async fn test_snippet_is_truncated() {
        let model = MockModel::answering(Some("technical"));
        let text = "あ".repeat(CLASSIFY_SNIPPET_CHARS + 500);
        classify_content(&model, &text).await;

        let prompts = model.prompts.lock().unwrap();
        let shown = prompts[0].chars().filter(|c| *c == 'あ').count();
        assert_eq!(shown, CLASSIFY_SNIPPET_CHARS);
    }
}
