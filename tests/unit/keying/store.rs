use super::*;

#[test]
fn entries_are_created_lazily_with_defaults() {
    let mut store = SettingsStore::new();
    let id = SourceId::from("clip-1");
    assert!(store.get(&id).is_none());

    let s = store.get_or_default("clip-1");
    assert_eq!(*s, KeySettings::default());
    assert_eq!(store.len(), 1);
}

#[test]
fn enable_update_and_disable_mutate_in_place() {
    let mut store = SettingsStore::new();
    let id = SourceId::from("clip-1");

    assert!(store.enable("clip-1").enabled());
    store.update("clip-1", |s| s.set_similarity(3.0));
    assert_eq!(store.get(&id).unwrap().similarity(), 1.0);

    store.disable(&id);
    assert!(!store.get(&id).unwrap().enabled());

    let ghost = SourceId::from("ghost");
    store.disable(&ghost);
    assert!(!store.contains(&ghost));
}

#[test]
fn remove_and_retain_leave_no_orphans() {
    let mut store = SettingsStore::new();
    for id in ["a", "b", "c"] {
        store.enable(id);
    }
    assert!(store.remove(&SourceId::from("b")).is_some());
    assert!(store.remove(&SourceId::from("b")).is_none());

    let live = ["a"];
    let dropped = store.retain_sources(|id| live.contains(&id.0.as_str()));
    assert_eq!(dropped, 1);
    assert_eq!(store.iter().map(|(id, _)| id.0.clone()).collect::<Vec<_>>(), vec!["a"]);
}

#[test]
fn detected_and_picked_colors_write_back() {
    let mut store = SettingsStore::new();
    let frame = FrameRGBA::filled(2, 2, [0, 0, 255, 255]).unwrap();
    let c = store.apply_detected_key("clip", &frame).unwrap();
    assert_eq!(c, Rgb8::new(0, 0, 255));
    assert_eq!(store.get(&"clip".into()).unwrap().key_color(), c);

    store.set_key_color("clip", Rgb8::new(1, 2, 3));
    assert_eq!(
        store.get(&"clip".into()).unwrap().key_color(),
        Rgb8::new(1, 2, 3)
    );

    assert_eq!(store.apply_picked_color("clip", &PickState::TimedOut), None);
    let picked = store.apply_picked_color("clip", &PickState::Picked(Rgb8::new(9, 9, 9)));
    assert_eq!(picked, Some(Rgb8::new(9, 9, 9)));
    assert_eq!(
        store.get(&"clip".into()).unwrap().key_color(),
        Rgb8::new(9, 9, 9)
    );
}

#[test]
fn json_export_import_round_trips() {
    let mut store = SettingsStore::new();
    store.set(
        "b",
        KeySettings::enabled_default()
            .with_key_color(Rgb8::new(0, 0, 255))
            .with_spill(0.7),
    );
    store.set("a", KeySettings::default());

    let json = store.to_json().unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["b"]["keyColor"], serde_json::json!("#0000FF"));

    let back = SettingsStore::from_json(&json).unwrap();
    assert_eq!(back, store);
}
