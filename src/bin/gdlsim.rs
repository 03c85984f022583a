//! gdlsim - random playouts and scripted replays of GDL games.
//!
//! ```text
//! gdlsim <game.kif> [--rollouts N] [--seed S] [--threads T] [--config cfg.json]
//!                   [--replay moves.txt] [--show-state] [--json] [--metrics] [--flame out.folded]
//! ```
//!
//! Logs go to stderr; set `GDLSIM_LOG` (or `RUST_LOG`) to change the level
//! when built with the `tracing` feature.

use std::process::exit;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use serde::Serialize;

use gdlgraph::metrics::MetricsReport;
use gdlgraph::moves::parse_joint_move;
use gdlgraph::trace::{info, info_span, init_flamegraph, init_subscriber};
use gdlgraph::{EngineConfig, GdlError, Result, RolloutStatus, RuleSet, SequenceOutcome, Simulator};

const USAGE: &str = "usage: gdlsim <game.kif> [--rollouts N] [--seed S] [--threads T] \
[--config cfg.json] [--replay moves.txt] [--show-state] [--json] [--metrics] [--flame out.folded]";

struct Options {
    game: String,
    rollouts: usize,
    seed: u64,
    threads: usize,
    config: Option<String>,
    replay: Option<String>,
    show_state: bool,
    json: bool,
    metrics: bool,
    flame: Option<String>,
}

fn parse_args(args: &[String]) -> std::result::Result<Options, String> {
    let mut opts = Options {
        game: String::new(),
        rollouts: 100,
        seed: 0,
        threads: 1,
        config: None,
        replay: None,
        show_state: false,
        json: false,
        metrics: false,
        flame: None,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{name} needs a value"))
        };
        match arg.as_str() {
            "--rollouts" => opts.rollouts = number(&value("--rollouts")?)?,
            "--seed" => opts.seed = number(&value("--seed")?)?,
            "--threads" => opts.threads = number::<usize>(&value("--threads")?)?.max(1),
            "--config" => opts.config = Some(value("--config")?),
            "--replay" => opts.replay = Some(value("--replay")?),
            "--show-state" => opts.show_state = true,
            "--json" => opts.json = true,
            "--metrics" => opts.metrics = true,
            "--flame" => opts.flame = Some(value("--flame")?),
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with("--") => return Err(format!("unknown option {other}\n{USAGE}")),
            other if opts.game.is_empty() => opts.game = other.to_string(),
            other => return Err(format!("unexpected argument {other}\n{USAGE}")),
        }
    }
    if opts.game.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok(opts)
}

fn number<T: std::str::FromStr>(text: &str) -> std::result::Result<T, String> {
    text.parse().map_err(|_| format!("'{text}' is not a number"))
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    rollouts: usize,
    terminal: usize,
    inconsistent: usize,
    exhausted: usize,
    average_goals: Vec<f64>,
    average_ticks: f64,
    ticks_per_second: f64,
}

#[derive(Debug, Default)]
struct Partial {
    terminal: usize,
    inconsistent: usize,
    exhausted: usize,
    goal_sums: Vec<f64>,
    ticks: usize,
    metrics: MetricsReport,
}

fn run_worker(rules: Arc<RuleSet>, cfg: EngineConfig, seed: u64, rollouts: usize) -> Result<Partial> {
    let _span = info_span!("worker", seed, rollouts).entered();
    let mut sim = Simulator::new(rules, cfg, seed)?;
    let mut part = Partial {
        goal_sums: vec![0.0; sim.players()],
        ..Partial::default()
    };
    for _ in 0..rollouts {
        let rollout = sim.rollout();
        part.ticks += rollout.ticks;
        match rollout.status {
            RolloutStatus::Terminal(goals) => {
                part.terminal += 1;
                for (sum, g) in part.goal_sums.iter_mut().zip(goals) {
                    *sum += g;
                }
            }
            RolloutStatus::Inconsistent => part.inconsistent += 1,
            RolloutStatus::Exhausted => part.exhausted += 1,
        }
    }
    part.metrics = sim.metrics().report();
    info!(terminal = part.terminal, ticks = part.ticks, "worker done");
    Ok(part)
}

fn run_rollouts(
    rules: Arc<RuleSet>,
    cfg: &EngineConfig,
    opts: &Options,
) -> Result<(Summary, MetricsReport)> {
    let started = Instant::now();
    let threads = opts.threads.min(opts.rollouts.max(1));
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut handles = Vec::with_capacity(threads);
    for w in 0..threads {
        let share = opts.rollouts / threads + usize::from(w < opts.rollouts % threads);
        let tx = tx.clone();
        let rules = Arc::clone(&rules);
        let cfg = cfg.clone();
        let seed = opts.seed.wrapping_add(w as u64);
        handles.push(thread::spawn(move || {
            // The receiver outlives every worker.
            let _ = tx.send(run_worker(rules, cfg, seed, share));
        }));
    }
    drop(tx);

    let mut total = Partial {
        goal_sums: vec![0.0; rules.roles().len()],
        ..Partial::default()
    };
    for part in rx {
        let part = part?;
        total.terminal += part.terminal;
        total.inconsistent += part.inconsistent;
        total.exhausted += part.exhausted;
        total.ticks += part.ticks;
        total.metrics.absorb(&part.metrics);
        for (sum, g) in total.goal_sums.iter_mut().zip(part.goal_sums) {
            *sum += g;
        }
    }
    for handle in handles {
        if handle.join().is_err() {
            return Err(GdlError::Config("rollout worker panicked".to_string()));
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    let per = |n: f64, d: usize| if d == 0 { 0.0 } else { n / d as f64 };
    let summary = Summary {
        rollouts: opts.rollouts,
        terminal: total.terminal,
        inconsistent: total.inconsistent,
        exhausted: total.exhausted,
        average_goals: total
            .goal_sums
            .iter()
            .map(|&s| per(s * 100.0, total.terminal))
            .collect(),
        average_ticks: per(total.ticks as f64, opts.rollouts),
        ticks_per_second: if elapsed > 0.0 { total.ticks as f64 / elapsed } else { 0.0 },
    };
    Ok((summary, total.metrics))
}

fn replay(rules: Arc<RuleSet>, cfg: EngineConfig, opts: &Options, path: &str) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let sequence: Vec<Vec<String>> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(';'))
        .map(|l| parse_joint_move(&rules, l))
        .collect::<Result<_>>()?;

    let mut sim = Simulator::new(rules, cfg, opts.seed)?;
    let outcome = sim.play_sequence(&sequence)?;
    let terminal = sim.is_terminal();
    let goals = if terminal { sim.goals() } else { None };
    let state = sim.render_state();

    if opts.json {
        let (name, step, player) = match outcome {
            SequenceOutcome::Completed => ("completed", None, None),
            SequenceOutcome::EarlyTerminal(step) => ("early_terminal", Some(step), None),
            SequenceOutcome::InvalidMove { step, player } => ("invalid_move", Some(step), Some(player)),
        };
        let doc = serde_json::json!({
            "outcome": name,
            "step": step,
            "player": player,
            "terminal": terminal,
            "goals": goals,
            "state": if opts.show_state { Some(&state) } else { None },
        });
        println!("{doc}");
        return Ok(());
    }

    println!("replay: {outcome:?} after {} joint moves", sequence.len());
    println!("terminal: {terminal}");
    if let Some(goals) = goals {
        let shown: Vec<String> = goals.iter().map(|g| format!("{:.0}", g * 100.0)).collect();
        println!("goals: {}", shown.join(" "));
    }
    if opts.show_state {
        for fact in &state {
            println!("  {fact}");
        }
    }
    Ok(())
}

fn run(opts: &Options) -> Result<()> {
    let cfg = match &opts.config {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let text = std::fs::read_to_string(&opts.game)?;
    let rules = Arc::new(RuleSet::from_kif(&text)?);
    info!(game = %opts.game, roles = rules.roles().len(), "game loaded");

    if let Some(path) = &opts.replay {
        return replay(rules, cfg, opts, path);
    }

    let (summary, metrics) = run_rollouts(Arc::clone(&rules), &cfg, opts)?;
    if opts.json {
        let doc = serde_json::to_string_pretty(&summary)
            .map_err(|e| GdlError::Config(format!("cannot serialize summary: {e}")))?;
        println!("{doc}");
    } else {
        println!(
            "{} rollouts: {} terminal, {} inconsistent, {} exhausted",
            summary.rollouts, summary.terminal, summary.inconsistent, summary.exhausted
        );
        for (role, avg) in rules.roles().iter().zip(&summary.average_goals) {
            let name = rules.symbols().lookup(*role).unwrap_or("?");
            println!("  {name}: {avg:.1}");
        }
        println!(
            "{:.1} ticks per rollout, {:.0} ticks/sec",
            summary.average_ticks, summary.ticks_per_second
        );
    }

    if opts.metrics {
        eprint!("{metrics}");
    }

    if opts.show_state {
        let sim = Simulator::new(rules, cfg, opts.seed)?;
        println!("initial state:");
        for fact in sim.render_state() {
            println!("  {fact}");
        }
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{msg}");
            exit(2);
        }
    };
    let _flame = match &opts.flame {
        Some(path) => match init_flamegraph(path) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("Error: {e}");
                exit(1);
            }
        },
        None => {
            init_subscriber("warn");
            None
        }
    };
    if let Err(e) = run(&opts) {
        eprintln!("Error: {e}");
        exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn options_parse() {
        let opts = parse_args(&args(&["game.kif", "--rollouts", "5", "--threads", "0", "--json"])).unwrap();
        assert_eq!(opts.game, "game.kif");
        assert_eq!(opts.rollouts, 5);
        assert_eq!(opts.threads, 1);
        assert!(opts.json && !opts.show_state);
        assert!(opts.flame.is_none());

        let opts = parse_args(&args(&["--flame", "out.folded", "game.kif", "--metrics"])).unwrap();
        assert!(opts.metrics);
        assert_eq!(opts.flame.as_deref(), Some("out.folded"));
        assert_eq!(opts.rollouts, 100);
    }

    #[test]
    fn bad_options_are_reported() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["g.kif", "--seed"])).is_err());
        assert!(parse_args(&args(&["g.kif", "--seed", "x"])).is_err());
        assert!(parse_args(&args(&["g.kif", "--bogus"])).is_err());
    }
}
