//! End-to-end ranking scenarios against the public engine API

use chrono::{DateTime, Duration, TimeZone, Utc};
use herald_common::config::{BlendWeights, RankingConfig};
use herald_common::ErrorCode;
use herald_ranking::{
    Direction, Insertion, NewArticle, RankQuery, RankingEngine, RecomputeOutcome, TimeWindow,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn t(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap() + Duration::days(day)
}

fn engine_with(weights: BlendWeights) -> RankingEngine {
    let mut config = RankingConfig::default();
    config.blend = weights;
    RankingEngine::new(config).unwrap()
}

fn base_only() -> RankingEngine {
    engine_with(BlendWeights::new(1.0, 0.0, 0.0))
}

#[test]
fn test_citation_cycle_is_symmetric() {
    let engine = base_only();
    engine
        .add_article(NewArticle::new("A", t(0), "arxiv").with_authors(["alice"]))
        .unwrap();
    engine
        .add_article(NewArticle::new("B", t(5), "arxiv").with_authors(["bob"]))
        .unwrap();
    engine
        .add_article(NewArticle::new("C", t(5), "arxiv").with_authors(["carol"]))
        .unwrap();
    engine.add_citation("A", "B").unwrap();
    engine.add_citation("B", "C").unwrap();
    engine.add_citation("C", "A").unwrap();
    engine.recompute().unwrap();

    for id in ["A", "B", "C"] {
        let record = engine.article_score(id).unwrap();
        assert!((record.base_influence - 1.0).abs() < 1e-6, "{} base {}", id, record.base_influence);
    }
    for author in ["alice", "bob", "carol"] {
        assert!((engine.author(author).unwrap().influence - 1.0).abs() < 1e-6);
    }

    let query = RankQuery::new(TimeWindow::new(t(-1), t(10)).unwrap());
    let results = engine.rank(&query).unwrap();
    let ids: Vec<_> = results.iter().map(|r| r.article_id.as_str()).collect();

    // Tied scores: newer first, then id
    assert_eq!(ids, vec!["B", "C", "A"]);
    assert!(results.iter().all(|r| r.composite_score == results[0].composite_score));
    assert_eq!(
        results.iter().map(|r| r.rank_position).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn test_isolated_article_never_zero() {
    let engine = base_only();
    for (id, day) in [("A", 0), ("B", 1), ("C", 2), ("D", 3)] {
        engine.add_article(NewArticle::new(id, t(day), "arxiv")).unwrap();
    }
    engine.add_citation("A", "B").unwrap();
    engine.add_citation("B", "C").unwrap();
    engine.add_citation("C", "A").unwrap();
    engine.recompute().unwrap();

    let d = engine.article_score("D").unwrap().base_influence;
    assert!(d > 0.0);
    assert!(d >= 0.15 - 1e-9);
    for id in ["A", "B", "C"] {
        assert!(engine.article_score(id).unwrap().base_influence > d);
    }
}

#[test]
fn test_mass_conservation_on_random_graphs() {
    for seed in [7_u64, 42, 1234] {
        let mut rng = StdRng::seed_from_u64(seed);
        let engine = base_only();
        let n = rng.gen_range(5..60);

        for i in 0..n {
            engine
                .add_article(NewArticle::new(format!("p{}", i), t(i as i64), "arxiv"))
                .unwrap();
        }
        for _ in 0..n * 2 {
            let from = rng.gen_range(0..n);
            let to = rng.gen_range(0..n);
            if from != to {
                engine
                    .add_citation(&format!("p{}", from), &format!("p{}", to))
                    .unwrap();
            }
        }

        let outcome = engine.recompute().unwrap();
        assert!(matches!(outcome, RecomputeOutcome::Published { .. }));

        let snapshot = engine.snapshot();
        let total: f64 = snapshot.entries().iter().map(|e| e.base_influence).sum();
        assert!((total - n as f64).abs() < 1e-6, "seed {}: total {} for n {}", seed, total, n);
        assert!(snapshot.entries().iter().all(|e| e.base_influence > 0.0));
    }
}

#[test]
fn test_dangling_articles_keep_mass() {
    let engine = base_only();
    for (id, day) in [("hub", 0), ("x", 1), ("y", 2), ("z", 3)] {
        engine.add_article(NewArticle::new(id, t(day), "arxiv")).unwrap();
    }
    // Everything flows into the hub, which cites nothing
    for id in ["x", "y", "z"] {
        engine.add_citation(id, "hub").unwrap();
    }
    engine.recompute().unwrap();

    let snapshot = engine.snapshot();
    let total: f64 = snapshot.entries().iter().map(|e| e.base_influence).sum();
    assert!((total - 4.0).abs() < 1e-9);
    assert!(snapshot.get("hub").unwrap().base_influence > 1.0);
}

#[test]
fn test_rank_is_deterministic() {
    let engine = engine_with(BlendWeights::new(0.5, 0.3, 0.2));
    let mut rng = StdRng::seed_from_u64(99);
    for i in 0..30 {
        let authors = vec![format!("author{}", rng.gen_range(0..8))];
        engine
            .add_article(NewArticle::new(format!("p{}", i), t(i), "arxiv").with_authors(authors))
            .unwrap();
    }
    for _ in 0..60 {
        let (from, to) = (rng.gen_range(0..30), rng.gen_range(0..30));
        if from != to {
            engine.add_citation(&format!("p{}", from), &format!("p{}", to)).unwrap();
        }
    }
    engine.recompute().unwrap();

    let query = RankQuery::new(TimeWindow::new(t(0), t(40)).unwrap()).top_k(15);
    let first = engine.rank(&query).unwrap();
    for _ in 0..5 {
        assert_eq!(engine.rank(&query).unwrap(), first);
    }
    assert_eq!(first.len(), 15);
    assert!(first.windows(2).all(|w| w[0].composite_score >= w[1].composite_score));
}

#[test]
fn test_reingestion_is_a_noop() {
    let engine = base_only();
    let a = NewArticle::new("A", t(0), "arxiv").with_authors(["alice"]);
    let b = NewArticle::new("B", t(1), "arxiv").with_authors(["bob"]);
    engine.add_article(a.clone()).unwrap();
    engine.add_article(b.clone()).unwrap();
    engine.add_citation("A", "B").unwrap();
    engine.recompute().unwrap();

    let version = engine.graph_version();
    let before = engine.snapshot();

    assert_eq!(engine.add_article(a).unwrap(), Insertion::Unchanged);
    assert_eq!(engine.add_article(b).unwrap(), Insertion::Unchanged);
    assert_eq!(engine.add_citation("A", "B").unwrap(), Insertion::Unchanged);
    assert_eq!(engine.graph_version(), version);
    assert_eq!(engine.recompute().unwrap(), RecomputeOutcome::UpToDate { version });
    assert!(std::sync::Arc::ptr_eq(&before, &engine.snapshot()));
}

#[test]
fn test_ingestion_errors_leave_graph_intact() {
    let engine = base_only();
    engine.add_article(NewArticle::new("A", t(0), "arxiv")).unwrap();
    let version = engine.graph_version();

    let err = engine.add_article(NewArticle::new("A", t(3), "arxiv")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateArticle);
    assert_eq!(engine.add_citation("A", "A").unwrap_err().code(), ErrorCode::SelfCitation);
    assert_eq!(engine.add_citation("A", "B").unwrap_err().code(), ErrorCode::UnknownArticle);

    assert_eq!(engine.graph_version(), version);
    assert!(engine.neighbors("A", Direction::Both).unwrap().is_empty());
}

#[test]
fn test_withdrawn_articles_still_propagate() {
    let engine = base_only();
    for (id, day) in [("A", 0), ("B", 1), ("C", 2)] {
        engine.add_article(NewArticle::new(id, t(day), "arxiv")).unwrap();
    }
    engine.add_citation("A", "C").unwrap();
    engine.add_citation("B", "C").unwrap();
    engine.mark_withdrawn("C").unwrap();
    engine.recompute().unwrap();

    let query = RankQuery::new(TimeWindow::new(t(0), t(5)).unwrap());
    let ids: Vec<_> = engine
        .rank(&query)
        .unwrap()
        .into_iter()
        .map(|r| r.article_id)
        .collect();
    assert_eq!(ids, vec!["B", "A"]);

    // Still scored and queryable by id
    assert!(engine.article_score("C").unwrap().base_influence > 1.0);
}

#[test]
fn test_wait_for_published_version() {
    let engine = base_only();
    engine.add_article(NewArticle::new("A", t(0), "arxiv")).unwrap();
    engine.recompute().unwrap();

    let snapshot = tokio_test::block_on(engine.wait_for_version(1)).unwrap();
    assert_eq!(snapshot.version(), 1);
}

#[test]
fn test_outcome_serializes_with_status_tag() {
    let engine = base_only();
    engine.add_article(NewArticle::new("A", t(0), "arxiv")).unwrap();

    let published = serde_json::to_value(engine.recompute().unwrap()).unwrap();
    assert_eq!(published["status"], "published");
    assert_eq!(published["version"], 1);

    let up_to_date = serde_json::to_value(engine.recompute().unwrap()).unwrap();
    assert_eq!(up_to_date["status"], "up_to_date");
}
