//! Scenario replay lock tests over the demo fixture.
//!
//! Proves:
//! 1. Replays are deterministic in-process
//! 2. The demo transcript shows the expected dispatch outcomes and effects
//! 3. Transcript files written to disk match the in-memory digest
//! 4. The descriptor digest is independent of the scenario

use uad_harness::capabilities::standard_registry;
use uad_harness::fixtures::{demo_descriptor, DEMO_SCENARIO};
use uad_harness::scenario::{parse_scenario, Scenario, Step};
use uad_harness::session::{replay, write_transcript, DIGEST_FILENAME, TRANSCRIPT_FILENAME};
use uad_harness::transcript::Transcript;
use uad_kernel::operators::sink::SideEffect;

fn demo_transcript() -> Transcript {
    let bytes = demo_descriptor().unwrap();
    let scenario = parse_scenario(DEMO_SCENARIO.as_bytes()).unwrap();
    let registry = standard_registry().unwrap();
    replay(&bytes, &scenario, &registry).unwrap()
}

fn outcome(t: &Transcript, step: usize) -> (String, serde_json::Value) {
    let r = &t.entries[step].result;
    (r["outcome"].as_str().unwrap_or("").to_string(), r["layer"].clone())
}

#[test]
fn demo_replay_deterministic() {
    let a = demo_transcript();
    let b = demo_transcript();
    assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    assert_eq!(a.digest().unwrap(), b.digest().unwrap());
}

#[test]
fn demo_outcomes() {
    let t = demo_transcript();
    let handled0 = ("handled".to_string(), serde_json::json!(0));
    let handled1 = ("handled".to_string(), serde_json::json!(1));

    assert_eq!(outcome(&t, 0), handled0);
    assert_eq!(
        t.entries[0].effects,
        vec![SideEffect::Message {
            payload: vec![0x90, 60, 0x7f]
        }]
    );
    assert_eq!(
        t.entries[1].effects,
        vec![SideEffect::Message {
            payload: vec![0x80, 60, 0]
        }]
    );
    // Note on channel 1 then color, in record order.
    assert_eq!(
        t.entries[4].effects,
        vec![
            SideEffect::Message {
                payload: vec![0x91, 62, 0x40]
            },
            SideEffect::Color {
                cell: 3,
                rgb: 0x12_3456
            },
        ]
    );
    // (4,0) unbound on the only enabled layer, raw key unmapped.
    assert_eq!(outcome(&t, 5), ("unhandled".to_string(), serde_json::Value::Null));
    assert_eq!(outcome(&t, 6), ("unmapped".to_string(), serde_json::Value::Null));

    // Layer 1 enabled: red on (0,0), fallthrough into the toggle, empty
    // cell consumes.
    assert_eq!(outcome(&t, 10), handled1);
    assert_eq!(outcome(&t, 11), handled0);
    assert_eq!(outcome(&t, 12), handled1);
    assert!(t.entries[12].effects.is_empty());
    assert_eq!(outcome(&t, 13), handled0);
    assert_eq!(outcome(&t, 15), ("unhandled".to_string(), serde_json::json!(1)));

    // init_layer top resolved to 1 and painted red.
    assert_eq!(t.entries[9].result["layer"], 1);
    assert!(t.entries[9]
        .effects
        .contains(&SideEffect::Color { cell: 0, rgb: 0xff_0000 }));

    assert!(t.entries.iter().all(|e| e.failures.is_empty()));
}

#[test]
fn render_paints_effect_cells() {
    let t = demo_transcript();
    let render = &t.entries[7];
    assert_eq!(render.op, "render");
    assert_eq!(render.result["cells"], 2);
    assert_eq!(
        render.effects,
        vec![SideEffect::Color { cell: 63, rgb: 0x00_00ff }]
    );
}

#[test]
fn final_registers_recorded() {
    let t = demo_transcript();
    // The second counter press is consumed by the empty cell on layer 1.
    let counter = t
        .registers
        .iter()
        .find(|(k, _)| k.cell == 2)
        .map(|&(_, v)| v);
    assert_eq!(counter, Some(1));
}

#[test]
fn written_files_match_digest() {
    let t = demo_transcript();
    let dir = tempfile::tempdir().unwrap();
    let digest = write_transcript(dir.path(), &t).unwrap();
    assert_eq!(digest, t.digest().unwrap());
    let stored = std::fs::read_to_string(dir.path().join(DIGEST_FILENAME)).unwrap();
    assert_eq!(stored, digest.as_str());
    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join(TRANSCRIPT_FILENAME)).unwrap())
            .unwrap();
    assert_eq!(json["schema_version"], "transcript.v1");
    assert_eq!(json["descriptor"]["digest"], t.descriptor.digest.as_str());
}

#[test]
fn descriptor_digest_independent_of_scenario() {
    let bytes = demo_descriptor().unwrap();
    let registry = standard_registry().unwrap();
    let empty = Scenario::default();
    let one = Scenario {
        steps: vec![Step::Render],
        ..Scenario::default()
    };
    let a = replay(&bytes, &empty, &registry).unwrap();
    let b = replay(&bytes, &one, &registry).unwrap();
    assert_eq!(a.descriptor.digest, b.descriptor.digest);
    assert_ne!(a.digest().unwrap(), b.digest().unwrap());
}
