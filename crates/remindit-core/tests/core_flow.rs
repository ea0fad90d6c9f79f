use chrono::{NaiveTime, Utc};
use remindit_core::datastore::DataStore;
use remindit_core::identity::{SessionFile, TokenPair};
use remindit_core::item::Item;
use remindit_core::reorder::{DropOutcome, ReorderTuning};
use remindit_core::replay::{self, RowLayout, ScriptEvent};
use tempfile::tempdir;

fn seed(store: &DataStore, titles: &[&str]) {
    let mut items = store.load_items().expect("load items");
    let at = NaiveTime::from_hms_opt(9, 30, 0).expect("valid time");
    for title in titles {
        items
            .append(Item::new(title.to_string(), String::new(), at, Utc::now()))
            .expect("append");
    }
    store.save_items(&items).expect("save items");
}

fn titles(store: &DataStore) -> Vec<String> {
    store
        .load_items()
        .expect("load items")
        .list()
        .iter()
        .map(|item| item.title.clone())
        .collect()
}

const LAYOUT: RowLayout = RowLayout {
    row_height: 40.0,
    row_spacing: 5.0,
};

#[test]
fn datastore_roundtrip_keeps_order() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    assert!(store.load_items().expect("load empty").is_empty());

    seed(&store, &["Water plants", "Call mum", "Stretch"]);
    assert_eq!(titles(&store), ["Water plants", "Call mum", "Stretch"]);

    let reopened = DataStore::open(temp.path()).expect("reopen");
    let items = reopened.load_items().expect("load");
    assert_eq!(items.len(), 3);
    assert_eq!(
        items.list()[0].scheduled,
        NaiveTime::from_hms_opt(9, 30, 0).expect("valid time")
    );
}

#[test]
fn committed_drag_is_persisted() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    seed(&store, &["A", "B", "C", "D"]);

    let mut items = store.load_items().expect("load");
    let events = [
        ScriptEvent::Down { item: 4, y: 150.0 },
        ScriptEvent::Move { y: 120.0 },
        ScriptEvent::Move { y: 50.0 },
        ScriptEvent::Up,
    ];
    let summary =
        replay::run(&mut items, ReorderTuning::default(), LAYOUT, 400.0, &events).expect("replay");
    assert!(matches!(
        summary.outcomes.as_slice(),
        [DropOutcome::Committed { from: 3, to: 1, .. }]
    ));
    store.save_items(&items).expect("save");

    assert_eq!(titles(&store), ["A", "D", "B", "C"]);
}

#[test]
fn cancelled_drag_leaves_file_untouched() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    seed(&store, &["A", "B", "C"]);
    let before = std::fs::read_to_string(&store.items_path).expect("read items");

    let mut items = store.load_items().expect("load");
    let events = [
        ScriptEvent::Down { item: 1, y: 20.0 },
        ScriptEvent::Move { y: 110.0 },
        ScriptEvent::Leave,
        ScriptEvent::Up,
    ];
    let summary =
        replay::run(&mut items, ReorderTuning::default(), LAYOUT, 400.0, &events).expect("replay");
    assert!(!summary.committed());
    assert_eq!(items, store.load_items().expect("reload"));

    let after = std::fs::read_to_string(&store.items_path).expect("read items");
    assert_eq!(before, after);
}

#[test]
fn session_file_lives_next_to_items() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let session = SessionFile::new(store.data_dir.join("session.json"));

    session
        .save(&TokenPair {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        })
        .expect("save session");
    assert!(session.has_valid_session());
    assert!(store.load_items().expect("items still load").is_empty());
}
