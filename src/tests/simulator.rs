use super::*;
use crate::test_utils::{REACHABILITY, TICTACTOE};

fn sim(text: &str) -> Simulator {
    Simulator::from_kif(text, EngineConfig::default(), 7).expect("game should compile")
}

#[test]
fn initial_moves_of_tictactoe() {
    let mut s = sim(TICTACTOE);
    assert_eq!(s.phase(), Phase::Idle);
    let moves = s.compute_moves();
    assert_eq!(moves[0].len(), 9);
    assert_eq!(moves[1].len(), 1);
    assert_eq!(s.render_moves(1), vec!["(oplayer noop)".to_string()]);
    assert_eq!(s.phase(), Phase::MovesComputed);
}

#[test]
fn restart_restores_initial_facts() {
    let mut s = sim(TICTACTOE);
    let initial = s.render_state();
    assert_eq!(initial.len(), 10);
    assert!(initial.contains(&"(control xplayer)".to_string()));

    s.compute_moves();
    s.apply_scripted(&["(mark 2 2)", "noop"]).unwrap();
    s.advance();
    assert_ne!(s.render_state(), initial);
    assert_eq!(s.depth(), 1);

    s.restart();
    assert_eq!(s.render_state(), initial);
    assert_eq!(s.depth(), 0);
}

#[test]
fn scripted_move_must_be_legal() {
    let mut s = sim(TICTACTOE);
    s.compute_moves();
    let err = s.apply_scripted(&["(mark 4 4)", "noop"]).unwrap_err();
    assert!(matches!(err, GdlError::InvalidMove { player: 0, .. }));
    assert!(err.is_recoverable());
}

#[test]
fn apply_indexes_checks_bounds() {
    let mut s = sim(TICTACTOE);
    s.compute_moves();
    assert!(s.apply_indexes(&[0, 0]).is_ok());
    assert_eq!(s.phase(), Phase::MovesApplied);
    s.compute_moves();
    assert!(s.apply_indexes(&[9, 0]).is_err());
}

#[test]
fn save_and_load() {
    let mut s = sim(TICTACTOE);
    s.save();
    let before = s.render_state();
    s.compute_moves();
    s.apply_scripted(&["(mark 1 3)", "noop"]).unwrap();
    s.advance();
    assert!(s.load());
    assert_eq!(s.render_state(), before);
}

#[test]
fn encoded_state_round_trips() {
    let mut s = sim(TICTACTOE);
    s.compute_moves();
    s.apply_scripted(&["(mark 3 1)", "noop"]).unwrap();
    s.advance();
    let bytes = s.encode_state();
    let moves_before = {
        s.compute_moves();
        (s.render_moves(0), s.render_moves(1))
    };

    s.restart();
    let decoded = s.decode_state(&bytes).unwrap();
    s.restore(&decoded).unwrap();
    s.compute_moves();
    assert_eq!((s.render_moves(0), s.render_moves(1)), moves_before);
}

#[test]
fn restore_rejects_foreign_shape() {
    let mut s = sim(TICTACTOE);
    let wrong = StateSnapshot::new(vec![Relation::new(3)]);
    assert!(matches!(s.restore(&wrong), Err(GdlError::StateDecode(_))));
}

#[test]
fn rollouts_of_tictactoe_end_in_terminal_states() {
    let mut s = sim(TICTACTOE);
    for _ in 0..5 {
        let rollout = s.rollout();
        assert!(rollout.ticks >= 5 && rollout.ticks <= 9, "ticks = {}", rollout.ticks);
        match rollout.status {
            RolloutStatus::Terminal(goals) => {
                assert_eq!(goals.len(), 2);
                assert!((goals[0] + goals[1] - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected status {other:?}"),
        }
    }
}

#[test]
fn short_tick_bound_exhausts() {
    let cfg = EngineConfig {
        max_ticks: 2,
        ..EngineConfig::default()
    };
    let mut s = Simulator::from_kif(TICTACTOE, cfg, 1).unwrap();
    let rollout = s.rollout();
    assert_eq!(rollout.status, RolloutStatus::Exhausted);
    assert_eq!(rollout.ticks, 2);
}

#[test]
fn terminal_depending_on_legal_is_detected() {
    let text = "(role r) (init (n 0)) (succ 0 1) (succ 1 2)
        (<= (legal r inc) (true (n ?x)) (succ ?x ?y))
        (<= (next (n ?y)) (true (n ?x)) (succ ?x ?y))
        (<= terminal (not (legal r inc)))
        (<= (goal r 100) (true (n 2)))";
    let mut s = sim(text);
    assert!(s.terminal_contains_legal());
    let rollout = s.rollout();
    assert_eq!(rollout.ticks, 2);
    assert_eq!(rollout.status, RolloutStatus::Terminal(vec![1.0]));
}

#[test]
fn missing_goal_is_inconsistent() {
    let text = "(role r) (init (n 0)) (succ 0 1)
        (<= (legal r inc) (true (n ?x)) (succ ?x ?y))
        (<= (next (n ?y)) (true (n ?x)) (succ ?x ?y))
        (<= terminal (true (n 1)))
        (<= (goal r 100) (true (n 0)))";
    let mut s = sim(text);
    let rollout = s.rollout();
    assert_eq!(rollout.status, RolloutStatus::Inconsistent);
}

#[test]
fn generated_games_replay() {
    let mut s = sim(TICTACTOE);
    let lines = s.generate_sequence(20);
    assert!(!lines.is_empty() && lines.len() <= 9);
    assert!(s.is_terminal());
    let final_state = s.render_state();

    let sequence: Vec<Vec<String>> = lines
        .iter()
        .map(|l| crate::moves::parse_joint_move(s.rules(), l).unwrap())
        .collect();
    assert_eq!(s.play_sequence(&sequence).unwrap(), SequenceOutcome::Completed);
    assert_eq!(s.render_state(), final_state);
}

#[test]
fn replay_reports_invalid_and_early_terminal() {
    let mut s = sim(TICTACTOE);
    let bad = vec![vec!["(mark 1 1)", "noop"], vec!["noop", "(mark 1 1)"]];
    assert_eq!(
        s.play_sequence(&bad).unwrap(),
        SequenceOutcome::InvalidMove { step: 1, player: 1 }
    );

    let win = vec![
        vec!["(mark 1 1)", "noop"],
        vec!["noop", "(mark 2 1)"],
        vec!["(mark 1 2)", "noop"],
        vec!["noop", "(mark 2 2)"],
        vec!["(mark 1 3)", "noop"],
        vec!["noop", "(mark 3 3)"],
    ];
    assert_eq!(s.play_sequence(&win).unwrap(), SequenceOutcome::EarlyTerminal(5));
}

#[test]
fn walker_escapes_through_d() {
    let mut s = sim(REACHABILITY);
    let script = vec![vec!["(go b)"], vec!["(go c)"], vec!["(go d)"]];
    assert_eq!(s.play_sequence(&script).unwrap(), SequenceOutcome::Completed);
    assert!(s.is_terminal());
    assert_eq!(s.goals(), Some(vec![1.0]));
}

#[test]
fn full_advance_step_reaches_terminal() {
    let mut s = sim(TICTACTOE);
    let mut steps = 0;
    while !s.full_advance_step().unwrap() {
        steps += 1;
        assert!(steps < 9);
    }
    assert_eq!(s.phase(), Phase::Terminal);
}
