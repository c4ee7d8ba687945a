//! Save/replay round-trip through the public API.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use connfilter::{persist, FilterEngine, FilterMode};

#[test]
fn saved_list_replays_into_equivalent_permanent_set() {
    let now = Utc::now();
    let mut engine = FilterEngine::new(FilterMode::Deny, 64);
    engine.add("192.0.2.0/24", 0, now).unwrap();
    engine.add("198.51.100.7", 0, now).unwrap();
    engine.add("2002:db8::/64", 0, now).unwrap();
    engine.add("203.0.113.9", 5, now).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("listip.cfg");
    engine.sweep(now);
    persist::save(&path, engine.mode(), engine.entries()).unwrap();

    let mut restored = FilterEngine::new(FilterMode::Allow, 64);
    persist::load(&path, &mut restored, now).unwrap();

    assert_eq!(restored.mode(), FilterMode::Deny);

    let expected: HashSet<String> = engine
        .entries()
        .filter(|e| e.is_permanent())
        .map(|e| e.mask.to_string())
        .collect();
    let replayed: HashSet<String> = restored.entries().map(|e| e.mask.to_string()).collect();
    assert_eq!(replayed, expected);
    assert_eq!(restored.len(), 3);

    // the temporary ban did not survive, and everything restored is
    // permanent
    assert!(!replayed.contains("203.0.113.9/32"));
    assert!(restored.entries().all(|e| e.is_permanent()));
}

#[test]
fn second_save_round_trip_is_stable() {
    let now = Utc::now();
    let mut engine = FilterEngine::new(FilterMode::Allow, 16);
    engine.add("10.0.0.0/8", 0, now).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.cfg");
    let second = dir.path().join("second.cfg");

    engine.sweep(now);
    persist::save(&first, engine.mode(), engine.entries()).unwrap();

    let mut restored = FilterEngine::new(FilterMode::Deny, 16);
    persist::load(&first, &mut restored, now).unwrap();
    restored.sweep(now);
    persist::save(&second, restored.mode(), restored.entries()).unwrap();

    assert_eq!(
        std::fs::read_to_string(&first).unwrap(),
        std::fs::read_to_string(&second).unwrap()
    );
}

#[test]
fn restart_discards_expired_entries_before_save() {
    let now = Utc::now();
    let mut engine = FilterEngine::new(FilterMode::Deny, 16);
    engine.add("192.0.2.1", 0, now).unwrap();
    engine.add("192.0.2.2", 1, now).unwrap();

    let later = now + Duration::minutes(2);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("listip.cfg");
    engine.sweep(later);
    persist::save(&path, engine.mode(), engine.entries()).unwrap();

    let mut restored = FilterEngine::new(FilterMode::Deny, 16);
    persist::load(&path, &mut restored, later).unwrap();

    assert_eq!(restored.len(), 1);
    assert!(!restored.check("192.0.2.1".parse().unwrap(), later));
    assert!(restored.check("192.0.2.2".parse().unwrap(), later));
}
