//! Prompt builders for the enrichment, validation, and synthesis calls.
//!
//! Each prompt opens with a fixed instruction line so test doubles can
//! route on it.

use feedforge_common::{ContentItem, TopicGroup};

pub fn title_prompt(text: &str) -> String {
    format!(
        "Write a concise, specific headline for the following content. \
         Respond with the headline only.\n\n{text}"
    )
}

pub fn tags_prompt(text: &str) -> String {
    format!(
        "List 3-6 short topic tags for the following content as a \
         comma-separated line, most specific first.\n\n{text}"
    )
}

pub fn summary_prompt(text: &str) -> String {
    format!(
        "Summarize the following content in 3-5 sentences for a technical \
         reader.\n\n{text}"
    )
}

pub fn snippet_prompt(tags: &str, text: &str) -> String {
    format!(
        "Write a two-sentence news snippet for a digest page. \
         Topics: {tags}.\n\n{text}"
    )
}

pub fn validate_prompt(item: &ContentItem) -> String {
    format!(
        "Check the generated fields against the content and respond with \
         JSON only: {{\"title_valid\": bool, \"tags_valid\": bool, \
         \"summary_valid\": bool, \"snippet_valid\": bool, \
         \"issues\": {{field: reason, ...}}}}.\n\n\
         Title: {title}\nTags: {tags}\nSummary: {summary}\n\
         Snippet: {snippet}\n\nContent:\n{content}",
        title = item.title.as_deref().unwrap_or(""),
        tags = item.tags.as_deref().unwrap_or_default().join(", "),
        summary = item.summary.as_deref().unwrap_or(""),
        snippet = item.publish_snippet.as_deref().unwrap_or(""),
        content = item.cleaned_text.as_deref().unwrap_or(&item.raw_text),
    )
}

pub fn synthesize_prompt(group: &TopicGroup, content: &str) -> String {
    format!(
        "Write a single analysis narrative connecting the following \
         related items about \"{tag}\". Weave in the shared threads \
         rather than summarizing each item in turn.\n\n\
         Relationships: {relationships}\n\nItems:\n{content}",
        tag = group.dominant_tag,
        relationships =
            serde_json::to_string(&group.relationships).unwrap_or_else(|_| "{}".to_string()),
    )
}
