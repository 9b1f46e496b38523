//! Search index behavior through the public library API.

use chrono::{Duration, Utc};
use makerdb_server::search::{Collection, IndexDocument, SearchIndex, SearchSync};
use uuid::Uuid;

fn part(name: &str, mpn: &str, age_days: i64) -> IndexDocument {
    IndexDocument {
        collection: Collection::Parts,
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: String::new(),
        mpn: Some(mpn.to_string()).filter(|m| !m.is_empty()),
        parent_id: None,
        created_at: Utc::now() - Duration::days(age_days),
    }
}

fn bin(name: &str, parent_id: Option<Uuid>) -> IndexDocument {
    IndexDocument {
        collection: Collection::Storage,
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("Storage bin: {name}"),
        mpn: None,
        parent_id,
        created_at: Utc::now(),
    }
}

#[test]
fn test_rebuild_then_search_parts_by_mpn_fragment() {
    let index = SearchIndex::new().expect("index");
    assert!(!index.is_ready());

    index
        .replace_all(&[
            part("STM32 blue pill", "STM32F103C8T6", 3),
            part("Op-amp", "LM358DR", 2),
            part("Timer", "NE555P", 1),
        ])
        .expect("rebuild");
    assert!(index.is_ready());
    assert_eq!(index.num_docs(), 3);

    let hits = index
        .search(Collection::Parts, "f103", None, 20)
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].mpn.as_deref(), Some("STM32F103C8T6"));
}

#[test]
fn test_location_children_and_suggestions() {
    let index = SearchIndex::new().expect("index");
    let shelf = bin("SM01", None);
    let shelf_id = shelf.id;
    index
        .replace_all(&[
            shelf,
            bin("SM01-1A", Some(shelf_id)),
            bin("SM01-1B", Some(shelf_id)),
            bin("LG01-1A", None),
        ])
        .expect("rebuild");

    let children = index
        .search(Collection::Storage, "", Some(shelf_id), 20)
        .expect("search");
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|h| h.parent_id == Some(shelf_id)));

    let suggestions = index
        .suggest(Collection::Storage, "lg", 10)
        .expect("suggest");
    assert_eq!(suggestions, vec!["LG01-1A".to_string()]);
}

#[tokio::test]
async fn test_sync_events_reach_index() {
    let index = SearchIndex::new().expect("index");
    let (sync, worker) = SearchSync::spawn(index.clone());

    let kept = part("Crystal 16MHz", "ABM3-16", 0);
    let removed = part("Crystal 8MHz", "ABM3-8", 0);
    let removed_id = removed.id;
    sync.upsert(kept);
    sync.upsert(removed);
    sync.delete(removed_id);
    drop(sync);
    worker.await.expect("worker exits cleanly");

    let hits = index
        .search(Collection::Parts, "crystal", None, 20)
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Crystal 16MHz");
}
