//! End-to-end tests for the combination engine.
//!
//! These exercise the public API with in-memory storage and scripted
//! generators standing in for Ollama.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use craft_engine::element::{RecipeKey, RecipeOutcome};
use craft_engine::engine::{CraftEngine, EngineConfig, RecipeSource};
use craft_engine::error::{CraftError, ImportError};
use craft_engine::event::{EngineEvent, NullSink, VecSink};
use craft_engine::generate::{Generator, LlmError};
use craft_engine::store::MemStore;

/// Always errors, like an unreachable Ollama.
struct FailingGenerator;

impl Generator for FailingGenerator {
    fn propose(&self, _first: &str, _second: &str) -> Result<RecipeOutcome, LlmError> {
        Err(LlmError::Unavailable {
            url: "http://localhost:11434".into(),
        })
    }

    fn name(&self) -> String {
        "failing".into()
    }
}

/// Slow generator that counts its calls.
struct CountingGenerator {
    calls: AtomicUsize,
    delay: Duration,
}

impl Generator for CountingGenerator {
    fn propose(&self, first: &str, second: &str) -> Result<RecipeOutcome, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(RecipeOutcome::new(format!("{first}{second}"), "🧪"))
    }

    fn name(&self) -> String {
        "counting".into()
    }
}

fn test_engine() -> CraftEngine {
    CraftEngine::new(EngineConfig::default(), Arc::new(NullSink)).unwrap()
}

fn engine_with(generator: Arc<dyn Generator>, sink: Arc<VecSink>) -> CraftEngine {
    CraftEngine::open(
        EngineConfig::default(),
        Arc::new(MemStore::new()),
        Some(generator),
        sink,
    )
    .unwrap()
}

#[test]
fn recipe_key_is_order_independent() {
    for (a, b) in [("Water", "Fire"), ("Earth", "Air"), ("Steam", "Steam")] {
        assert_eq!(CraftEngine::recipe_key(a, b), CraftEngine::recipe_key(b, a));
    }
    assert_eq!(CraftEngine::recipe_key("Water", "Fire").as_str(), "Fire_Water");
}

#[test]
fn earth_and_water_make_a_plant() {
    let engine = test_engine();

    let first = engine.combine("Earth", "Water").unwrap();
    assert_eq!(first.result, "Plant");
    assert_eq!(first.glyph, "🌱");
    assert!(first.is_new);
    assert!(engine.is_discovered("Plant"));

    let second = engine.combine("Water", "Earth").unwrap();
    assert_eq!(second.result, "Plant");
    assert!(!second.is_new);
}

#[test]
fn unknown_pair_falls_back_when_generator_fails() {
    let sink = Arc::new(VecSink::new());
    let engine = engine_with(Arc::new(FailingGenerator), sink.clone());

    let combo = engine.combine("Fire", "Unobtainium").unwrap();
    assert_eq!(combo.result, "Fire ember");
    assert_eq!(combo.glyph, "🔥");
    assert_eq!(combo.source, RecipeSource::Fallback);
    assert!(combo.is_new);

    // The fallback result is now a regular recipe.
    let again = engine.combine("Unobtainium", "Fire").unwrap();
    assert_eq!(again.result, "Fire ember");
    assert_eq!(again.source, RecipeSource::Known);

    let events = sink.take();
    assert!(matches!(
        events.first(),
        Some(EngineEvent::GenerationStarted { first, second })
            if first == "Fire" && second == "Unobtainium"
    ));
}

#[test]
fn concurrent_combines_generate_once() {
    let generator = Arc::new(CountingGenerator {
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(50),
    });
    let engine = engine_with(generator.clone(), Arc::new(VecSink::new()));

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = &engine;
                scope.spawn(move || {
                    if i % 2 == 0 {
                        engine.combine("Moon", "Tide")
                    } else {
                        engine.combine("Tide", "Moon")
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
    });

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|c| c.result == results[0].result));
    assert_eq!(results.iter().filter(|c| c.is_new).count(), 1);
    assert_eq!(engine.pending_generations(), 0);
}

#[test]
fn discovery_only_grows() {
    let engine = test_engine();
    let mut previous = engine.discovered_elements().len();

    for (a, b) in [
        ("Water", "Fire"),
        ("Water", "Fire"),
        ("Earth", "Fire"),
        ("Air", "Lava"),
        ("Stone", "Stone"),
        ("Fire", "Unobtainium"),
    ] {
        engine.combine(a, b).unwrap();
        let now = engine.discovered_elements().len();
        assert!(now >= previous, "discovery shrank after {a} + {b}");
        previous = now;
    }
}

#[test]
fn every_discovered_element_is_in_the_catalog() {
    let engine = test_engine();
    engine.combine("Water", "Fire").unwrap();
    engine.combine("Cat", "Hat").unwrap();

    let snapshot = engine.snapshot();
    for name in &snapshot.discovered {
        assert!(snapshot.elements.contains_key(name), "{name} missing");
    }
}

#[test]
fn export_then_import_restores_state() {
    let source = test_engine();
    source.combine("Water", "Fire").unwrap();
    source.combine("Fire", "Unobtainium").unwrap();
    let json = source.export_json().unwrap();

    let target = test_engine();
    let report = target.import_json(&json).unwrap();
    assert_eq!(report.version, "2");
    assert_eq!(report.repaired, 0);

    assert_eq!(target.snapshot(), source.snapshot());
    assert!(target.is_discovered("Fire ember"));
}

#[test]
fn import_missing_fields_changes_nothing() {
    let sink = Arc::new(VecSink::new());
    let engine = CraftEngine::open(
        EngineConfig::default(),
        Arc::new(MemStore::new()),
        None,
        sink.clone(),
    )
    .unwrap();
    engine.combine("Water", "Fire").unwrap();
    let before = engine.snapshot();
    sink.take();

    let err = engine
        .import_json(r#"{"version": "2", "elements": []}"#)
        .unwrap_err();
    assert!(matches!(
        err,
        CraftError::Import(ImportError::MissingFields { ref fields }) if fields.len() == 2
    ));
    assert_eq!(engine.snapshot(), before);
    assert!(sink.is_empty());
}

#[test]
fn import_repairs_catalog_and_keeps_imported_recipes() {
    let engine = test_engine();
    let doc = r#"{
        "version": "2",
        "elements": [["Water", "💧"]],
        "recipes": [["Fire_Water", {"result": "Boiling", "glyph": "🫧"}]],
        "discovered": ["Water", "Ghost"]
    }"#;

    let report = engine.import_json(doc).unwrap();
    assert_eq!(report.repaired, 1);
    assert_eq!(
        engine.recipe("Fire", "Water"),
        Some(RecipeOutcome::new("Boiling", "🫧"))
    );
    // Seeds fill in around the import.
    assert!(engine.recipe("Earth", "Water").is_some());
    assert!(engine.is_discovered("Ghost"));
}

#[test]
fn reset_returns_to_starters_and_notifies() {
    let sink = Arc::new(VecSink::new());
    let engine = engine_with(Arc::new(FailingGenerator), sink.clone());
    engine.combine("Water", "Fire").unwrap();
    engine.combine("Fire", "Unobtainium").unwrap();

    engine.reset_to_default().unwrap();

    let names: Vec<String> = engine
        .discovered_elements()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["Air", "Earth", "Fire", "Water"]);
    assert_eq!(engine.recipe("Fire", "Unobtainium"), None);
    assert_eq!(sink.events().last(), Some(&EngineEvent::StateRefreshed));
}

#[test]
fn recipe_lookup_does_not_discover() {
    let engine = test_engine();
    let key = RecipeKey::new("Water", "Fire");
    assert_eq!(engine.snapshot().recipe(&key).unwrap().result, "Steam");
    assert_eq!(engine.recipe("Fire", "Water").unwrap().result, "Steam");
    assert!(!engine.is_discovered("Steam"));
}
