//! Context assembly for Wikipedia-enhanced quiz generation.
//!
//! Pipeline: topic → search → fetch candidates → score each against the topic
//! → keep only articles the relevance scorer trusts → assemble facts, related
//! topics, and a bounded summary for the generation prompt.

use tracing::{info, instrument, warn};

use crate::config::Prompts;
use crate::domain::WikipediaContext;
use crate::relevance::{extract_key_terms, relevance_score};
use crate::util::fill_template;
use crate::wikipedia::Wikipedia;

/// Articles scoring at or below this stay out of the assembled context
/// (the same boundary the fact-check endpoint labels `medium`).
const TRUST_THRESHOLD: f32 = 0.4;

/// How many search hits we consider per topic.
const SEARCH_LIMIT: u32 = 3;

/// Cap on the assembled summary, in characters.
const MAX_SUMMARY_CHARS: usize = 1200;

/// Build encyclopedia context for a topic. Untrusted or unfetchable articles
/// are demoted to `related_topics`; an empty context means nothing cleared
/// the relevance bar and the caller should generate without enhancement.
#[instrument(level = "info", skip(wiki), fields(%topic))]
pub async fn build_context(wiki: &Wikipedia, topic: &str) -> WikipediaContext {
    let key_terms = extract_key_terms(topic, None);
    let hits = wiki.search(topic, SEARCH_LIMIT).await;

    let mut ctx = WikipediaContext::default();
    for hit in &hits {
        let Some(article) = wiki.article(&hit.title).await else {
            ctx.related_topics.push(hit.title.clone());
            continue;
        };

        let score = relevance_score(topic, &article.title, &article.extract, &key_terms);
        if score > TRUST_THRESHOLD {
            if let Some(fact) = leading_sentence(&article.extract) {
                ctx.key_facts.push(fact);
            }
            ctx.articles.push(article);
        } else {
            warn!(target: "wikipedia", title = %article.title, score, "article below trust threshold; excluded from context");
            ctx.related_topics.push(hit.title.clone());
        }
    }

    ctx.summary = summarize(&ctx);
    info!(
        target: "wikipedia",
        trusted = ctx.articles.len(),
        related = ctx.related_topics.len(),
        "Wikipedia context assembled"
    );
    ctx
}

/// Render the enhanced generation prompt for a topic and its context.
pub fn enhanced_prompt(prompts: &Prompts, topic: &str, ctx: &WikipediaContext) -> String {
    fill_template(
        &prompts.enhanced_user_template,
        &[("topic", topic), ("context", &context_block(ctx))],
    )
}

/// The context as a plain-text block for prompt injection.
pub fn context_block(ctx: &WikipediaContext) -> String {
    let mut parts = Vec::new();
    if !ctx.key_facts.is_empty() {
        let facts: Vec<String> = ctx.key_facts.iter().map(|f| format!("- {f}")).collect();
        parts.push(format!("Key facts:\n{}", facts.join("\n")));
    }
    if !ctx.summary.is_empty() {
        parts.push(format!("Summary:\n{}", ctx.summary));
    }
    if !ctx.related_topics.is_empty() {
        parts.push(format!("Related topics: {}", ctx.related_topics.join(", ")));
    }
    parts.join("\n\n")
}

/// First sentence of an extract, if there is one.
fn leading_sentence(extract: &str) -> Option<String> {
    let trimmed = extract.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.find(". ") {
        Some(idx) => Some(trimmed[..idx + 1].to_string()),
        None => Some(trimmed.to_string()),
    }
}

/// Concatenate trusted extracts into a bounded summary.
fn summarize(ctx: &WikipediaContext) -> String {
    let mut out = String::new();
    for article in &ctx.articles {
        let extract = article.extract.trim();
        if extract.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(extract);
        if out.chars().count() >= MAX_SUMMARY_CHARS {
            out = out.chars().take(MAX_SUMMARY_CHARS).collect();
            break;
        }
    }
    out
}
