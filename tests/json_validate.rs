use cutscene::Script;

#[test]
fn json_fixture_validates() {
    let s = include_str!("data/comic_intro.json");
    let script: Script = serde_json::from_str(s).unwrap();
    script.validate().unwrap();
    assert!(script.unresolved_targets().is_empty());
    assert_eq!(script.steps.len(), 5);
    assert_eq!(script.macro_steps.len(), 5);
    assert_eq!(script.panels.len(), 2);
}

#[test]
fn unknown_targets_are_reported_not_rejected() {
    let s = r#"{
        "steps": [
            { "target": "ghost", "action": "FadeIn", "duration": 0.5 },
            { "action": "WaitSeconds", "seconds": 0.1 }
        ]
    }"#;
    let script = Script::from_json(s).unwrap();
    script.validate().unwrap();
    let unresolved = script.unresolved_targets();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].0, 0);
    assert_eq!(unresolved[0].1.as_str(), "ghost");
}
