//! End-to-end orchestrator runs against the mock collaborators.
//!
//! Embeddings are pinned per headline so similarity outcomes are exact,
//! not hash luck.

use std::sync::Arc;

use feedforge_common::{PipelineConfig, PipelineError, RawItem, Stage, ValidationVerdict};
use feedforge_pipeline::testing::{
    complete_item, raw_item, MockAi, MockPublisher, MockSource, MockStore,
};
use feedforge_pipeline::Orchestrator;

struct Ctx {
    ai: Arc<MockAi>,
    store: Arc<MockStore>,
    publisher: Arc<MockPublisher>,
    orchestrator: Orchestrator,
}

fn ctx(items: Vec<RawItem>, ai: MockAi, store: MockStore) -> Ctx {
    let ai = Arc::new(ai);
    let store = Arc::new(store);
    let publisher = Arc::new(MockPublisher::new());
    let orchestrator = Orchestrator::new(
        Arc::new(MockSource::new(items)),
        ai.clone(),
        store.clone(),
        publisher.clone(),
        PipelineConfig::default(),
    );
    Ctx {
        ai,
        store,
        publisher,
        orchestrator,
    }
}

fn bad_title_verdict() -> ValidationVerdict {
    ValidationVerdict {
        title_valid: false,
        ..ValidationVerdict::all_valid()
    }
}

// ---------------------------------------------------------------------------
// Scenario 1: clean batch flows straight through to the digest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_publishes_and_persists() {
    let ai = MockAi::new()
        .on_embedding("rust async runtime released", vec![1.0, 0.0, 0.0])
        .on_embedding("new diffusion paper out", vec![0.0, 1.0, 0.0]);
    let ctx = ctx(
        vec![
            raw_item("rust async runtime released", "github"),
            raw_item("new diffusion paper out", "arxiv"),
        ],
        ai,
        MockStore::new(),
    );

    let stats = ctx.orchestrator.run(1).await.unwrap();

    assert_eq!(stats.items_acquired, 2);
    assert_eq!(stats.items_published, 2);
    assert_eq!(stats.items_not_novel, 0);
    assert_eq!(stats.narratives_synthesized, 0, "session 1 is off-interval");

    let persisted = ctx.store.persisted_items();
    assert_eq!(persisted.len(), 2);
    assert!(persisted.iter().all(|it| it.is_complete()));

    let published = ctx.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0.len(), 2);
    assert!(published[0].1.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario 2: the synthesis gate fires only on interval sessions
// ---------------------------------------------------------------------------

/// Four items fanned around a seed: every item sits at 0.75 similarity to
/// the first (joins the 0.7 cluster) while staying under the 0.85
/// duplicate threshold pairwise.
fn fan_batch(ai: MockAi) -> (Vec<RawItem>, MockAi) {
    let texts = [
        "alpha scaling report published today",
        "beta scaling report published today",
        "gamma scaling report published today",
        "delta scaling report published today",
    ];
    let vectors = [
        vec![1.0, 0.0, 0.0],
        vec![0.75, 0.6614, 0.0],
        vec![0.75, -0.3307, 0.5728],
        vec![0.75, -0.3307, -0.5728],
    ];
    let mut ai = ai.with_tags("llm, scaling");
    for (text, vector) in texts.iter().zip(vectors) {
        ai = ai.on_embedding(text, vector);
    }
    let items = texts.iter().map(|t| raw_item(t, "arxiv")).collect();
    (items, ai)
}

#[tokio::test]
async fn synthesis_runs_on_interval_sessions() {
    let (items, ai) = fan_batch(MockAi::new().with_narrative("The scaling story."));
    let ctx = ctx(items, ai, MockStore::new());

    let stats = ctx.orchestrator.run(10).await.unwrap();

    assert_eq!(stats.duplicates_intra_batch, 0);
    assert!(stats.groups_formed >= 1);
    assert_eq!(stats.narratives_synthesized, 1);

    let narratives = ctx.store.persisted_narratives();
    assert_eq!(narratives.len(), 1);
    assert_eq!(narratives[0].tag, "llm");
    assert_eq!(narratives[0].body, "The scaling story.");
    assert_eq!(narratives[0].member_ids.len(), 4);

    let published = ctx.publisher.published();
    assert_eq!(published[0].1.len(), 1);
}

#[tokio::test]
async fn off_interval_session_skips_synthesis() {
    let (items, ai) = fan_batch(MockAi::new());
    let ctx = ctx(items, ai, MockStore::new());

    let stats = ctx.orchestrator.run(11).await.unwrap();

    assert_eq!(stats.groups_formed, 0);
    assert_eq!(stats.narratives_synthesized, 0);
    assert_eq!(stats.items_published, 4, "skipping synthesis still publishes");
    assert!(ctx.store.persisted_narratives().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario 3: history defeats novelty
// ---------------------------------------------------------------------------

#[tokio::test]
async fn known_content_is_not_novel() {
    let ai = MockAi::new().on_embedding("the same old story", vec![1.0, 0.0, 0.0]);
    let store = MockStore::new().with_history(vec![complete_item(
        "previously published",
        "arxiv",
        vec![1.0, 0.0, 0.0],
        vec!["llm"],
    )]);
    let ctx = ctx(vec![raw_item("the same old story", "arxiv")], ai, store);

    let stats = ctx.orchestrator.run(1).await.unwrap();

    assert_eq!(stats.items_not_novel, 1);
    assert_eq!(stats.items_published, 0);
    assert!(ctx.store.persisted_items().is_empty());
    assert!(ctx.publisher.published()[0].0.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario 4: intra-batch duplicate resolved by source priority
// ---------------------------------------------------------------------------

#[tokio::test]
async fn intra_batch_duplicate_keeps_better_source() {
    // arXiv comes first in batch order but GitHub outranks it.
    let ai = MockAi::new()
        .on_embedding("release notes for v2", vec![0.998, 0.063, 0.0])
        .on_embedding("paper describing the release", vec![1.0, 0.0, 0.0]);
    let ctx = ctx(
        vec![
            raw_item("paper describing the release", "arxiv"),
            raw_item("release notes for v2", "github"),
        ],
        ai,
        MockStore::new(),
    );

    let stats = ctx.orchestrator.run(1).await.unwrap();

    assert_eq!(stats.duplicates_intra_batch, 1);
    assert_eq!(stats.items_published, 1);
    let persisted = ctx.store.persisted_items();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].source_name, "github");
}

// ---------------------------------------------------------------------------
// Scenario 5: validator redo loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_verdict_triggers_one_redo() {
    let ai = MockAi::new()
        .push_verdict(&bad_title_verdict())
        .push_verdict(&ValidationVerdict::all_valid());
    let ctx = ctx(vec![raw_item("a shaky headline draft", "github")], ai, MockStore::new());

    let stats = ctx.orchestrator.run(1).await.unwrap();

    assert_eq!(stats.redo_enrich, 1);
    assert_eq!(stats.forced_forward, 0);
    assert_eq!(stats.items_published, 1);

    let headline_calls = ctx
        .ai
        .prompts()
        .iter()
        .filter(|p| p.starts_with("Write a concise"))
        .count();
    assert_eq!(headline_calls, 2, "title generated once, then regenerated");

    let persisted = ctx.store.persisted_items();
    assert!(persisted[0].is_complete());
    assert!(persisted[0].last_verdict.is_none());
}

#[tokio::test]
async fn exhausted_redo_forwards_item_with_verdict() {
    // Bad verdict on both passes: one redo allowed, then forward anyway.
    let ai = MockAi::new()
        .push_verdict(&bad_title_verdict())
        .push_verdict(&bad_title_verdict());
    let ctx = ctx(vec![raw_item("a stubbornly bad headline", "github")], ai, MockStore::new());

    let stats = ctx.orchestrator.run(1).await.unwrap();

    assert_eq!(stats.redo_enrich, 1);
    assert_eq!(stats.forced_forward, 1);
    assert_eq!(stats.items_published, 1, "exhausted items are forwarded, not dropped");

    let persisted = ctx.store.persisted_items();
    assert!(persisted[0].is_complete());
    let verdict = persisted[0].last_verdict.as_ref().unwrap();
    assert!(!verdict.title_valid);
}

// ---------------------------------------------------------------------------
// Scenario 6: junk input is an item problem, not a run problem
// ---------------------------------------------------------------------------

#[tokio::test]
async fn junk_item_is_excluded_without_failing_the_run() {
    // The second item cleans down to nothing; it must be excluded while
    // the rest of the batch flows through.
    let ctx = ctx(
        vec![
            raw_item("a perfectly good item", "github"),
            raw_item("@@@ $$$ ^^^", "x"),
        ],
        MockAi::new(),
        MockStore::new(),
    );

    let stats = ctx.orchestrator.run(1).await.unwrap();

    assert_eq!(stats.incomplete_excluded, 1);
    assert_eq!(stats.items_published, 1);

    let persisted = ctx.store.persisted_items();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].source_name, "github");
}

// ---------------------------------------------------------------------------
// Scenario 7: a stage failure aborts the run before any writes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ai_failure_aborts_stage_without_writes() {
    let ai = MockAi::new().failing_completions();
    let ctx = ctx(vec![raw_item("doomed item", "github")], ai, MockStore::new());

    let err = ctx.orchestrator.run(1).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::StageAborted {
            stage: Stage::Enrich,
            ..
        }
    ));

    assert!(ctx.store.persisted_items().is_empty());
    assert!(ctx.store.persisted_narratives().is_empty());
    assert!(ctx.publisher.published().is_empty());
}
