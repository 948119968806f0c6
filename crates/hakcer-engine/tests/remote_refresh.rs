use std::sync::Arc;
use std::time::Duration;

use hakcer_core::RuleVersion;
use hakcer_engine::{
    Engine, EngineConfig, HttpManifestSource, RefreshOutcome, SyncError,
};
use hakcer_store::{KvStore, MemoryStore};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manifest(version: &str, ids: &[&str]) -> serde_json::Value {
    let rules: Vec<_> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "name": id,
                "description": "",
                "category": "filler",
                "patternString": format!(r"\b{id}\b"),
                "patternFlags": "gi",
                "replaceString": ""
            })
        })
        .collect();
    serde_json::json!({ "version": version, "updated": "2026-10", "rules": rules })
}

async fn serve(server: &MockServer, body: serde_json::Value) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/rules.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn engine_for(server: &MockServer, store: Arc<dyn KvStore>) -> Engine {
    let source = HttpManifestSource::new(
        format!("{}/rules.json", server.uri()),
        Duration::from_secs(5),
        64 * 1024,
    )
    .unwrap();
    let config = EngineConfig {
        sync_timeout: Duration::from_millis(500),
        ..EngineConfig::default()
    };
    Engine::open(store, Arc::new(source), config).await.unwrap()
}

#[tokio::test]
async fn refresh_replaces_builtins_and_keeps_custom_rules() {
    let server = MockServer::start().await;
    serve(&server, manifest("1.1.0", &["filler-just", "furthermore"])).await;
    let engine = engine_for(&server, Arc::new(MemoryStore::new())).await;

    engine.rules().toggle("filler-just", false).await.unwrap();
    engine.rules().toggle("filler-adverbs", false).await.unwrap();
    let custom = engine
        .rules()
        .add_custom_rule(hakcer_core::RuleDraft {
            name: "x".into(),
            pattern_string: "x".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let result = engine.refresh(&CancellationToken::new()).await;
    let report = result.as_ref().unwrap();
    assert_eq!(report.version, RuleVersion::new("1.1.0"));
    assert_eq!(report.rules_count, 2);
    let outcome = serde_json::to_value(RefreshOutcome::from(&result)).unwrap();
    assert_eq!(outcome["success"], true);

    let rules = engine.rules();
    assert_eq!(rules.snapshot().len(), 3);
    assert!(!rules.get_rule("filler-just").unwrap().is_enabled());
    assert!(rules.get_rule("furthermore").unwrap().is_enabled());
    assert!(rules.get_rule("filler-adverbs").is_none());
    assert!(rules.get_rule(custom.id()).is_some());

    let analysis = engine.analyze("furthermore, x marks");
    assert_eq!(analysis.optimized_text, ",  marks");

    let info = engine.sync().last_update_info();
    assert_eq!(info.display_label(), Some("2026-10"));
}

#[tokio::test]
async fn strictly_older_manifest_is_rejected() {
    let server = MockServer::start().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let engine = engine_for(&server, Arc::clone(&store)).await;

    serve(&server, manifest("2.0", &["alpha"])).await;
    engine.refresh(&CancellationToken::new()).await.unwrap();

    serve(&server, manifest("1.9", &["beta"])).await;
    let result = engine.refresh(&CancellationToken::new()).await;
    assert!(matches!(result, Err(SyncError::StaleVersion { .. })));
    let outcome = serde_json::to_value(RefreshOutcome::from(&result)).unwrap();
    assert_eq!(outcome["success"], false);

    assert!(engine.rules().get_rule("alpha").is_some());
    assert!(engine.rules().get_rule("beta").is_none());
    assert_eq!(engine.sync().last_update_info().version, RuleVersion::new("2.0"));

    // the cached catalog is what a fresh engine starts from
    let reopened = engine_for(&server, store).await;
    assert!(reopened.rules().get_rule("alpha").is_some());
}

#[tokio::test]
async fn server_error_leaves_catalog_usable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let engine = engine_for(&server, Arc::new(MemoryStore::new())).await;
    let before = engine.sync().last_update_info();

    let err = engine.refresh(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SyncError::Http { status: 503 }));
    assert_eq!(engine.sync().last_update_info(), before);
    assert!(engine.analyze("please help").changed());
}

#[tokio::test]
async fn manifest_with_one_bad_rule_is_rejected_whole() {
    let server = MockServer::start().await;
    let mut body = manifest("5.0", &["good"]);
    body["rules"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({"id": "bad", "name": "bad", "patternString": "(unclosed"}));
    serve(&server, body).await;
    let engine = engine_for(&server, Arc::new(MemoryStore::new())).await;

    let err = engine.refresh(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SyncError::Manifest(_)));
    assert!(engine.rules().get_rule("good").is_none());
    assert!(engine.rules().get_rule("politeness-please").is_some());
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(manifest("9.0", &["late"]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let engine = engine_for(&server, Arc::new(MemoryStore::new())).await;

    let err = engine.refresh(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout(_)));
    assert!(engine.rules().get_rule("late").is_none());
}
