use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
};

use serde_json::Value;
use time::macros::datetime;

use recall_storage::{Category, Error, InMemoryStore, MemoryRecord};

fn record(id: &str, scope: &str, text: &str, vector: Vec<f32>) -> MemoryRecord {
	MemoryRecord {
		id: id.to_string(),
		text: text.to_string(),
		vector,
		category: Category::Fact,
		scope: scope.to_string(),
		importance: 0.7,
		created_at: datetime!(2026-10-01 00:00 UTC),
		metadata: Value::Null,
	}
}

fn scopes(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}

fn store() -> InMemoryStore {
	InMemoryStore::from_records(vec![
		record("a", "global", "User prefers dark mode in the editor.", vec![1.0, 0.0, 0.0]),
		record("b", "agent:main", "The deploy window is Friday afternoon.", vec![0.0, 1.0, 0.0]),
		record("c", "agent:other", "User prefers tea over coffee.", vec![0.9, 0.1, 0.0]),
		record("d", "global", "Dark roast coffee is the team favourite.", vec![0.0, 0.0, 1.0]),
	])
	.expect("Failed to build store.")
}

#[test]
fn vector_search_is_scoped_and_ordered() {
	let store = store();
	let hits = store.vector_search(&scopes(&["global", "agent:main"]), &[1.0, 0.0, 0.0], 10);
	let ids: Vec<&str> = hits.iter().map(|hit| hit.record.id.as_str()).collect();

	assert_eq!(ids[0], "a");
	assert!(!ids.contains(&"c"));
	assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn vector_search_respects_top_k() {
	let store = store();
	let visible = scopes(&["global", "agent:main", "agent:other"]);
	let hits = store.vector_search(&visible, &[1.0, 1.0, 1.0], 2);

	assert_eq!(hits.len(), 2);
}

#[test]
fn full_text_search_scores_matching_terms() {
	let store = store();
	let hits = store.full_text_search(&scopes(&["global", "agent:main"]), "dark mode", 10);
	let ids: Vec<&str> = hits.iter().map(|hit| hit.record.id.as_str()).collect();

	assert_eq!(ids, vec!["a", "d"]);
	assert!(hits.iter().all(|hit| hit.score > 0.0 && hit.score <= 1.0));
	assert!((hits[0].score - 1.0).abs() < 1e-6);
	assert!(hits[0].score > hits[1].score);
}

#[test]
fn full_text_best_match_scores_one_for_a_single_hit() {
	let store = store();
	let hits = store.full_text_search(&scopes(&["agent:main"]), "when is the deploy window", 10);

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].record.id, "b");
	assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn full_text_search_skips_non_matching_and_empty_queries() {
	let store = store();

	assert!(store.full_text_search(&scopes(&["global"]), "kubernetes", 10).is_empty());
	assert!(store.full_text_search(&scopes(&["global"]), "  ", 10).is_empty());
}

#[test]
fn duplicate_ids_conflict() {
	let mut store = store();
	let err = store
		.insert(record("a", "global", "Another text.", vec![1.0, 0.0, 0.0]))
		.expect_err("Expected conflict.");

	assert!(matches!(err, Error::Conflict(_)));
	assert_eq!(store.len(), 4);

	let err = InMemoryStore::from_records(vec![
		record("x", "global", "First.", vec![]),
		record("y", "global", "Second.", vec![]),
		record("x", "global", "Third.", vec![]),
	])
	.expect_err("Expected conflict.");

	assert!(matches!(err, Error::Conflict(_)));
}

#[test]
fn loads_jsonl_records() {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let mut path: PathBuf = env::temp_dir();

	path.push(format!(
		"recall_storage_test_{}_{}.jsonl",
		std::process::id(),
		COUNTER.fetch_add(1, Ordering::SeqCst)
	));

	let payload = concat!(
		r#"{"id":"r1","text":"User prefers dark mode.","vector":[1.0,0.0],"category":"preference","scope":"global","importance":0.9,"created_at":"2026-10-01T00:00:00Z"}"#,
		"\n\n",
		r#"{"id":"r2","text":"Deploys happen on Fridays.","scope":"agent:main","created_at":"2026-09-01T12:30:00Z","metadata":{"source":"chat"}}"#,
		"\n"
	);

	fs::write(&path, payload).expect("Failed to write records.");

	let result = InMemoryStore::load_jsonl(&path);

	fs::remove_file(&path).expect("Failed to remove records.");

	let store = result.expect("Failed to load records.");

	assert_eq!(store.len(), 2);

	let hits = store.full_text_search(&scopes(&["agent:main"]), "fridays", 5);

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].record.category, Category::Other);
	assert_eq!(hits[0].record.importance, 0.7);
	assert_eq!(hits[0].record.metadata["source"], "chat");
}

#[test]
fn malformed_jsonl_reports_line() {
	let mut path: PathBuf = env::temp_dir();

	path.push(format!("recall_storage_bad_{}.jsonl", std::process::id()));
	fs::write(&path, "{\"id\":\"r1\"}\n").expect("Failed to write records.");

	let result = InMemoryStore::load_jsonl(&path);

	fs::remove_file(&path).expect("Failed to remove records.");

	assert!(matches!(result, Err(Error::Parse { line: 1, .. })));
}

#[test]
fn importance_is_clamped_on_read() {
	let mut high = record("x", "global", "text", vec![]);

	high.importance = 3.0;

	assert_eq!(high.importance(), 1.0);

	high.importance = f32::NAN;

	assert_eq!(high.importance(), 0.7);
}
