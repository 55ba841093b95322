//! Content validation: parse the external verdict, decide where the
//! pipeline goes next.
//!
//! The correctness judgment itself comes from the AI collaborator; this
//! module owns the decision logic around it. A transport failure
//! propagates (the stage aborts); a malformed response degrades to the
//! conservative all-false verdict so unvalidated content never slips
//! through.

use std::sync::Arc;

use anyhow::Result;
use feedforge_common::{ContentItem, PipelineError, Stage, ValidationVerdict};
use tracing::warn;

use crate::prompts;
use crate::traits::AiService;

pub struct ContentValidator {
    ai: Arc<dyn AiService>,
}

impl ContentValidator {
    pub fn new(ai: Arc<dyn AiService>) -> Self {
        Self { ai }
    }

    /// Judge one complete item. Errors only on AI transport failure.
    pub async fn validate(&self, item: &ContentItem) -> Result<ValidationVerdict> {
        let prompt = prompts::validate_prompt(item);
        let raw = self.ai.complete(&prompt).await?;
        Ok(parse_verdict(&raw))
    }
}

/// Parse a raw verdict response, falling back to the conservative verdict
/// when the payload is malformed.
pub fn parse_verdict(raw: &str) -> ValidationVerdict {
    match try_parse(raw) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(error = %e, "verdict response unparseable, blocking item");
            ValidationVerdict::parse_failure()
        }
    }
}

fn try_parse(raw: &str) -> Result<ValidationVerdict, PipelineError> {
    let trimmed = strip_code_fences(raw);
    serde_json::from_str(trimmed).map_err(|e| PipelineError::ValidationParse(e.to_string()))
}

/// Models wrap JSON in markdown fences more often than not.
fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Which stage the verdict sends the item back to, if any. Title/tag
/// problems re-enter enrich; summary/snippet problems re-enter summarize;
/// a clean verdict proceeds forward.
pub fn redo_target(verdict: &ValidationVerdict) -> Option<Stage> {
    if !verdict.title_valid || !verdict.tags_valid {
        Some(Stage::Enrich)
    } else if !verdict.summary_valid || !verdict.snippet_valid {
        Some(Stage::Summarize)
    } else {
        None
    }
}

/// Null out exactly the fields the verdict flagged. A null field is what
/// the regenerating stage keys off, so this is the whole redo mechanism.
pub fn clear_flagged_fields(item: &mut ContentItem, verdict: &ValidationVerdict) {
    if !verdict.title_valid {
        item.title = None;
    }
    if !verdict.tags_valid {
        item.tags = None;
    }
    if !verdict.summary_valid {
        item.summary = None;
    }
    if !verdict.snippet_valid {
        item.publish_snippet = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::complete_item;

    fn verdict(title: bool, tags: bool, summary: bool, snippet: bool) -> ValidationVerdict {
        ValidationVerdict {
            title_valid: title,
            tags_valid: tags,
            summary_valid: summary,
            snippet_valid: snippet,
            issues: Default::default(),
        }
    }

    #[test]
    fn invalid_title_routes_back_to_enrich() {
        assert_eq!(redo_target(&verdict(false, true, true, true)), Some(Stage::Enrich));
        assert_eq!(redo_target(&verdict(true, false, true, true)), Some(Stage::Enrich));
    }

    #[test]
    fn invalid_summary_routes_back_to_summarize() {
        assert_eq!(
            redo_target(&verdict(true, true, false, true)),
            Some(Stage::Summarize)
        );
        assert_eq!(
            redo_target(&verdict(true, true, true, false)),
            Some(Stage::Summarize)
        );
    }

    #[test]
    fn title_problems_outrank_summary_problems() {
        // Both broken: the earlier stage wins, and its re-run cascades.
        assert_eq!(
            redo_target(&verdict(false, true, false, true)),
            Some(Stage::Enrich)
        );
    }

    #[test]
    fn clean_verdict_proceeds() {
        assert_eq!(redo_target(&ValidationVerdict::all_valid()), None);
    }

    #[test]
    fn only_flagged_fields_are_cleared() {
        let mut item = complete_item("t", "arxiv", vec![1.0], vec!["tag"]);
        clear_flagged_fields(&mut item, &verdict(false, true, true, true));
        assert!(item.title.is_none());
        assert!(item.tags.is_some());
        assert!(item.summary.is_some());
        assert!(item.publish_snippet.is_some());
    }

    #[test]
    fn parses_plain_and_fenced_json() {
        let body = r#"{"title_valid":true,"tags_valid":true,"summary_valid":false,"snippet_valid":true,"issues":{"summary":"too short"}}"#;
        let plain = parse_verdict(body);
        assert!(!plain.summary_valid);
        assert_eq!(plain.issues["summary"], "too short");

        let fenced = format!("```json\n{body}\n```");
        assert_eq!(parse_verdict(&fenced), plain);
    }

    #[test]
    fn malformed_payload_degrades_to_blocking_verdict() {
        let v = parse_verdict("I think the title is fine!");
        assert_eq!(v, ValidationVerdict::parse_failure());
        assert!(!v.is_clean());
    }
}
