use gdlgraph::{EngineConfig, GdlError, Simulator, StateSnapshot};

const TICTACTOE: &str = include_str!("../games/tictactoe.kif");
const REACHABILITY: &str = include_str!("../games/reachability.kif");

fn all_moves(sim: &mut Simulator) -> Vec<Vec<String>> {
    sim.compute_moves();
    (0..sim.players()).map(|p| sim.render_moves(p)).collect()
}

#[test]
fn decoded_state_yields_the_same_moves() {
    let mut sim = Simulator::from_kif(TICTACTOE, EngineConfig::default(), 3).unwrap();
    for _ in 0..3 {
        assert!(!sim.full_advance_step().unwrap());
    }
    let bytes = sim.encode_state();
    let before = all_moves(&mut sim);
    let facts = sim.render_state();

    let mut fresh = Simulator::from_kif(TICTACTOE, EngineConfig::default(), 99).unwrap();
    let snapshot = fresh.decode_state(&bytes).unwrap();
    fresh.restore(&snapshot).unwrap();
    assert_eq!(fresh.render_state(), facts);
    assert_eq!(all_moves(&mut fresh), before);
}

#[test]
fn snapshot_survives_further_play() {
    let mut sim = Simulator::from_kif(REACHABILITY, EngineConfig::default(), 5).unwrap();
    sim.compute_moves();
    sim.apply_scripted(&["(go b)"]).unwrap();
    sim.advance();
    let snapshot = sim.snapshot();
    let before = all_moves(&mut sim);

    sim.apply_scripted(&["(go c)"]).unwrap();
    sim.advance();
    assert!(!sim.snapshot().same_facts(&snapshot));

    sim.restore(&snapshot).unwrap();
    assert_eq!(all_moves(&mut sim), before);
    assert!(sim.snapshot().same_facts(&snapshot));
}

#[test]
fn truncated_bytes_are_rejected() {
    let sim = Simulator::from_kif(TICTACTOE, EngineConfig::default(), 1).unwrap();
    let bytes = sim.encode_state();
    let err = sim.decode_state(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, GdlError::StateDecode(_)));
    assert!(err.is_recoverable());

    let empty = StateSnapshot::default();
    assert!(empty.encode().is_empty());
}
