//! Game simulation over a compiled [`ProofGraph`].
//!
//! One tick runs `compute_moves -> apply -> advance -> is_terminal`. The
//! simulator owns its graph exclusively; independent simulators built from
//! the same `Arc<RuleSet>` can run on separate threads.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::EngineConfig;
use crate::error::{GdlError, Result};
use crate::graph::{rel_pair, ProofGraph};
use crate::metrics::ProofMetrics;
use crate::moves::{bucket, find_move, Move};
use crate::relation::Relation;
use crate::ruleset::RuleSet;
use crate::state::StateSnapshot;
use crate::symbol::Symbol;
use crate::trace::{debug, info, warn};

/// Where the simulator is within a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    MovesComputed,
    MovesApplied,
    NextComputed,
    Terminal,
}

/// How a random rollout ended.
#[derive(Clone, Debug, PartialEq)]
pub enum RolloutStatus {
    /// Terminal state reached; one goal value in `[0, 1]` per player.
    Terminal(Vec<f64>),
    /// Terminal, but some player had no goal value, or some player had no
    /// legal move on the way.
    Inconsistent,
    /// The tick bound ran out first.
    Exhausted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rollout {
    pub status: RolloutStatus,
    pub ticks: usize,
}

/// Result of replaying a scripted game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceOutcome {
    Completed,
    /// The state was terminal before joint move `step` could be played.
    EarlyTerminal(usize),
    /// Player `player` had no legal move matching joint move `step`.
    InvalidMove { step: usize, player: usize },
}

pub struct Simulator {
    graph: ProofGraph,
    rules: Arc<RuleSet>,
    rng: SmallRng,
    phase: Phase,
    moves: Vec<Vec<Move>>,
    terminal_contains_legal: bool,
    initial: StateSnapshot,
    saved: Option<StateSnapshot>,
    depth: usize,
}

impl Simulator {
    /// Compile `rules` and put the simulator in the initial state.
    pub fn new(rules: Arc<RuleSet>, cfg: EngineConfig, seed: u64) -> Result<Self> {
        let names = rules.names();
        let terminal_contains_legal = rules.depends_on(names.terminal, names.legal);
        let graph = ProofGraph::compile(Arc::clone(&rules), cfg)?;
        let players = rules.roles().len();
        let mut sim = Self {
            graph,
            rules,
            rng: SmallRng::seed_from_u64(seed),
            phase: Phase::Idle,
            moves: vec![Vec::new(); players],
            terminal_contains_legal,
            initial: StateSnapshot::default(),
            saved: None,
            depth: 0,
        };
        sim.initial = sim.initial_state();
        sim.restart();
        debug!(players, terminal_contains_legal, "simulator ready");
        Ok(sim)
    }

    pub fn from_kif(text: &str, cfg: EngineConfig, seed: u64) -> Result<Self> {
        Self::new(Arc::new(RuleSet::from_kif(text)?), cfg, seed)
    }

    /// Initial facts plus whatever the `init` rules derive from them.
    fn initial_state(&mut self) -> StateSnapshot {
        let rules = Arc::clone(&self.rules);
        for &frame in rules.frames() {
            let rows = rules.init_facts(frame).unwrap_or(&[]);
            self.write_frame(frame, |rel| {
                let fresh = Relation::from_rows(rel.arity(), rows);
                rel.rewrite_indexed(&fresh);
            });
        }
        self.clear_does();
        self.graph.invalidate_reuse();

        let init = self.graph.roots.init.clone();
        let mut derived: Vec<(Symbol, Relation)> = Vec::new();
        for (frame, o) in init {
            if self.graph.prove(o) {
                derived.push((frame, self.graph.data(o).clone()));
            }
        }
        for (frame, rows) in derived {
            self.write_frame(frame, |rel| {
                rel.merge_append(&rows);
                rel.delete_duplicates(None, 0);
                rel.build_index();
            });
        }
        self.graph.invalidate_reuse();
        self.snapshot()
    }

    fn write_frame(&mut self, frame: Symbol, f: impl FnOnce(&mut Relation)) {
        if let Some(id) = self.graph.ground_relation(frame) {
            f(self.graph.relation_mut(id));
        }
    }

    fn clear_does(&mut self) {
        let does = self.rules.names().does;
        self.write_frame(does, Relation::clear);
    }

    pub fn graph(&self) -> &ProofGraph {
        &self.graph
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    pub fn metrics(&self) -> &ProofMetrics {
        self.graph.metrics()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Ticks advanced since the last restart.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn players(&self) -> usize {
        self.rules.roles().len()
    }

    pub fn terminal_contains_legal(&self) -> bool {
        self.terminal_contains_legal
    }

    /// Back to the initial state.
    pub fn restart(&mut self) {
        let initial = std::mem::take(&mut self.initial);
        self.load_frames(&initial);
        self.initial = initial;
        self.depth = 0;
        self.phase = Phase::Idle;
    }

    fn load_frames(&mut self, state: &StateSnapshot) {
        let rules = Arc::clone(&self.rules);
        for (&frame, rows) in rules.frames().iter().zip(state.frames()) {
            self.write_frame(frame, |rel| rel.rewrite_indexed(rows));
        }
        self.clear_does();
        self.graph.invalidate_reuse();
        self.moves.iter_mut().for_each(Vec::clear);
    }

    /// Prove `legal` and split it per player.
    pub fn compute_moves(&mut self) -> &[Vec<Move>] {
        let players = self.players();
        let legal = self.graph.roots.legal;
        self.moves = match legal {
            Some(o) if self.graph.prove(o) => bucket(self.graph.data(o), players),
            _ => vec![Vec::new(); players],
        };
        self.clear_does();
        self.phase = Phase::MovesComputed;
        &self.moves
    }

    pub fn moves(&self) -> &[Vec<Move>] {
        &self.moves
    }

    /// Legal moves of `player` as `(role action)` text.
    pub fn render_moves(&self, player: usize) -> Vec<String> {
        self.moves
            .get(player)
            .map(|ms| ms.iter().map(|m| m.render(&self.rules)).collect())
            .unwrap_or_default()
    }

    /// Play move `choice[p]` of every player `p`.
    pub fn apply_indexes(&mut self, choice: &[usize]) -> Result<()> {
        let mut rows: Vec<Vec<Symbol>> = Vec::with_capacity(choice.len());
        for (player, &i) in choice.iter().enumerate() {
            let mv = self
                .moves
                .get(player)
                .and_then(|ms| ms.get(i))
                .ok_or_else(|| GdlError::InvalidMove {
                    player,
                    text: format!("move #{i}"),
                })?;
            rows.push(mv.row().to_vec());
        }
        self.graph.set_facts(self.rules.names().does, &rows)?;
        self.phase = Phase::MovesApplied;
        Ok(())
    }

    /// Pick one legal move per player uniformly at random.
    pub fn random_joint_move(&mut self) -> Result<Vec<usize>> {
        let mut choice = Vec::with_capacity(self.moves.len());
        for (player, ms) in self.moves.iter().enumerate() {
            if ms.is_empty() {
                return Err(GdlError::InvalidMove {
                    player,
                    text: "no legal moves".to_string(),
                });
            }
            choice.push(self.rng.random_range(0..ms.len()));
        }
        Ok(choice)
    }

    pub fn apply_random(&mut self) -> Result<Vec<usize>> {
        let choice = self.random_joint_move()?;
        self.apply_indexes(&choice)?;
        Ok(choice)
    }

    /// Match one action text per player, e.g. `["(mark 1 1)", "noop"]`,
    /// against the computed moves and play them.
    pub fn apply_scripted<S: AsRef<str>>(&mut self, actions: &[S]) -> Result<()> {
        let choice = self.match_scripted(actions)?;
        self.apply_indexes(&choice)
    }

    fn match_scripted<S: AsRef<str>>(&self, actions: &[S]) -> Result<Vec<usize>> {
        let mut choice = Vec::with_capacity(self.moves.len());
        for (player, ms) in self.moves.iter().enumerate() {
            let text = actions.get(player).map_or("", |a| a.as_ref());
            // Unreadable text cannot name a legal move either.
            match find_move(&self.rules, ms, text).ok().flatten() {
                Some(i) => choice.push(i),
                None => {
                    warn!(player, text, "scripted move is not legal");
                    return Err(GdlError::InvalidMove {
                        player,
                        text: text.to_string(),
                    });
                }
            }
        }
        Ok(choice)
    }

    /// Prove every `next` disjunction against the current state and
    /// replace the frames with the results. Frames without `next` rules
    /// end up empty.
    pub fn advance(&mut self) {
        let next = self.graph.roots.next.clone();
        let proven: Vec<bool> = next
            .iter()
            .map(|&(_, o)| o.is_some_and(|o| self.graph.prove(o)))
            .collect();
        for (&(frame, o), ok) in next.iter().zip(proven) {
            let Some(dst) = self.graph.ground_relation(frame) else {
                continue;
            };
            match o {
                Some(o) if ok => {
                    let src = self.graph.or_node(o).data;
                    let (dst, src) = rel_pair(&mut self.graph.relations, dst, src);
                    dst.rewrite(src);
                    // Two next rules may derive the same fact.
                    dst.delete_duplicates(None, 0);
                    dst.build_index();
                }
                _ => self.graph.relation_mut(dst).clear(),
            }
        }
        self.clear_does();
        self.graph.invalidate_reuse();
        self.graph.metrics().record_tick();
        self.depth += 1;
        self.phase = Phase::NextComputed;
    }

    pub fn is_terminal(&mut self) -> bool {
        let root = self.graph.roots.terminal;
        let terminal = root.is_some_and(|o| self.graph.prove(o));
        if terminal {
            self.phase = Phase::Terminal;
        }
        terminal
    }

    /// Goal value of every player, scaled to `[0, 1]`. A player's value
    /// comes from the first of its goal rules that holds. `None` when
    /// some player has no value.
    pub fn goals(&mut self) -> Option<Vec<f64>> {
        let goals = self.graph.roots.goals.clone();
        let mut values = Vec::with_capacity(goals.len());
        for o in goals {
            match self.goal_value(o) {
                Some(v) => values.push(v),
                None => {
                    debug!(player = values.len(), "no goal value");
                    return None;
                }
            }
        }
        Some(values)
    }

    fn goal_value(&mut self, o: crate::graph::OrId) -> Option<f64> {
        let symbols = Arc::clone(self.rules.symbols());
        let parse = |sym: Symbol| -> Option<f64> {
            symbols.lookup(sym).ok()?.parse::<f64>().ok().map(|v| v * 0.01)
        };
        let node = self.graph.or_node(o);
        if let Some(g) = node.ground {
            let ground = self.graph.relation(g);
            let hit = ground
                .rows()
                .find(|row| node.query.as_ref().map_or(true, |q| q.pass(row)))
                .and_then(|row| row.get(1).copied());
            if let Some(sym) = hit {
                return parse(sym);
            }
        }
        for a in self.graph.or_node(o).realizations.clone() {
            if !self.graph.prove_and(a) {
                continue;
            }
            let main = self.graph.and_node(a).main();
            let rel = self.graph.relation(main);
            if rel.is_empty() {
                continue;
            }
            return rel.row(0).get(1).copied().and_then(parse);
        }
        None
    }

    /// Random playout from the initial state, bounded by `max_ticks`.
    pub fn rollout(&mut self) -> Rollout {
        self.restart();
        let max = self.graph.config().max_ticks as usize;
        let tcl = self.terminal_contains_legal;
        if tcl {
            self.compute_moves();
        }
        let mut ticks = 0;
        while ticks < max {
            if !tcl {
                self.compute_moves();
            }
            if self.apply_random().is_err() {
                return Rollout {
                    status: RolloutStatus::Inconsistent,
                    ticks,
                };
            }
            self.advance();
            ticks += 1;
            if tcl {
                self.compute_moves();
            }
            if self.is_terminal() {
                let status = match self.goals() {
                    Some(goals) => RolloutStatus::Terminal(goals),
                    None => RolloutStatus::Inconsistent,
                };
                return Rollout { status, ticks };
            }
        }
        info!(ticks, "rollout exhausted without reaching a terminal state");
        Rollout {
            status: RolloutStatus::Exhausted,
            ticks,
        }
    }

    /// Play one random joint move from the current state. Returns whether
    /// the new state is terminal; if not, its moves are already computed.
    pub fn full_advance_step(&mut self) -> Result<bool> {
        if self.phase != Phase::MovesComputed {
            self.compute_moves();
        }
        self.apply_random()?;
        self.advance();
        if self.is_terminal() {
            return Ok(true);
        }
        self.compute_moves();
        Ok(false)
    }

    /// Replay `sequence` from the initial state, one action text per player
    /// per joint move.
    pub fn play_sequence<S: AsRef<str>>(&mut self, sequence: &[Vec<S>]) -> Result<SequenceOutcome> {
        self.restart();
        for (step, actions) in sequence.iter().enumerate() {
            if self.is_terminal() {
                return Ok(SequenceOutcome::EarlyTerminal(step));
            }
            self.compute_moves();
            match self.apply_scripted(actions) {
                Ok(()) => {}
                Err(GdlError::InvalidMove { player, .. }) => {
                    return Ok(SequenceOutcome::InvalidMove { step, player });
                }
                Err(e) => return Err(e),
            }
            self.advance();
        }
        Ok(SequenceOutcome::Completed)
    }

    /// Play a random game of at most `max` joint moves from the initial
    /// state and record it, one `(role action) (role action)` line per
    /// joint move.
    pub fn generate_sequence(&mut self, max: usize) -> Vec<String> {
        self.restart();
        let mut lines = Vec::new();
        while lines.len() < max && !self.is_terminal() {
            self.compute_moves();
            let Ok(choice) = self.apply_random() else {
                break;
            };
            let line: Vec<String> = choice
                .iter()
                .enumerate()
                .map(|(p, &i)| self.moves[p][i].render(&self.rules))
                .collect();
            lines.push(line.join(" "));
            self.advance();
        }
        lines
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let frames = self
            .rules
            .frames()
            .iter()
            .map(|&f| {
                self.graph
                    .ground_relation(f)
                    .map(|id| self.graph.relation(id).clone())
                    .unwrap_or_else(|| Relation::new(self.rules.arity(f)))
            })
            .collect();
        StateSnapshot::new(frames)
    }

    /// Replace the frame state. The snapshot must come from the same game.
    pub fn restore(&mut self, state: &StateSnapshot) -> Result<()> {
        let frames = self.rules.frames();
        if state.frames().len() != frames.len() {
            return Err(GdlError::StateDecode(format!(
                "expected {} frames, got {}",
                frames.len(),
                state.frames().len()
            )));
        }
        for (&f, rel) in frames.iter().zip(state.frames()) {
            if rel.arity() != self.rules.arity(f) {
                return Err(GdlError::StateDecode(format!(
                    "frame {} has arity {}, expected {}",
                    self.rules.symbols().lookup(f).unwrap_or("?"),
                    rel.arity(),
                    self.rules.arity(f)
                )));
            }
        }
        self.load_frames(state);
        self.phase = Phase::Idle;
        Ok(())
    }

    pub fn save(&mut self) {
        self.saved = Some(self.snapshot());
    }

    /// Go back to the last [`Simulator::save`]. False when nothing was saved.
    pub fn load(&mut self) -> bool {
        let Some(saved) = self.saved.take() else {
            return false;
        };
        self.load_frames(&saved);
        self.saved = Some(saved);
        self.phase = Phase::Idle;
        true
    }

    pub fn encode_state(&self) -> Vec<u8> {
        self.snapshot().encode()
    }

    pub fn decode_state(&self, bytes: &[u8]) -> Result<StateSnapshot> {
        let arities: Vec<usize> = self.rules.frames().iter().map(|&f| self.rules.arity(f)).collect();
        StateSnapshot::decode(bytes, &arities)
    }

    /// Current frame facts as sorted KIF text.
    pub fn render_state(&self) -> Vec<String> {
        self.snapshot().render(&self.rules)
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("graph", &self.graph)
            .field("phase", &self.phase)
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/simulator.rs"]
mod tests;
