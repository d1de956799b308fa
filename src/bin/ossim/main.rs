//! ossim - Run scheduling and mutual-exclusion simulations.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use ossim::{
    exhaustive, parse_job_arg, parse_seed, seed_from_env, sweep, Behavior, EngineConfig,
    MutexScenario, MutexScenarioFile, MutexSim, Policy, SchedWorkload, SchedulerEngine, SimFormat,
};

/// Run scheduling and mutual-exclusion simulations.
#[derive(Parser)]
#[command(name = "ossim")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Schedule a job set under FCFS, SJF or SRTF and print the results.
    Sched(SchedArgs),
    /// Drive tellers through the flag/turn protocol round-robin.
    Mutex(MutexArgs),
    /// Search interleavings for mutual-exclusion violations.
    Explore(ExploreArgs),
}

#[derive(Args)]
struct SchedArgs {
    /// Path to a JSON scheduler workload.
    #[arg(long, value_name = "FILE")]
    workload: Option<PathBuf>,

    /// Scheduling policy (overrides the workload's).
    #[arg(short, long)]
    policy: Option<Policy>,

    /// Job as ID:ARRIVAL:BURST. May be repeated.
    ///
    /// Without any jobs (and no workload), the three-job demo
    /// P1:0:3 P2:2:6 P3:4:1 is scheduled.
    #[arg(short, long = "job", value_name = "ID:ARRIVAL:BURST")]
    jobs: Vec<String>,

    /// Run every policy on the same job set.
    #[arg(long)]
    compare: bool,

    /// Print trace events to stderr.
    #[arg(long)]
    dump_trace: bool,
}

#[derive(Args)]
struct MutexArgs {
    /// Path to a JSON mutex scenario.
    #[arg(long, value_name = "FILE")]
    scenario: Option<PathBuf>,

    /// Number of tellers (2 or 3).
    #[arg(short = 'n', long, default_value_t = 2)]
    participants: usize,

    /// Number of round-robin ticks to run.
    #[arg(short, long, default_value_t = 40)]
    ticks: u64,

    /// Steps each teller spends inside the critical section.
    #[arg(long, default_value_t = 2)]
    critical_steps: u32,

    /// Steps each teller rests between requests.
    #[arg(long, default_value_t = 2)]
    rest_steps: u32,

    /// Entries per teller before it stops (default: unbounded).
    #[arg(long)]
    cycles: Option<u32>,

    /// Print the shared state after every tick and the trace at the end.
    #[arg(long)]
    dump_trace: bool,

    /// Keep only the most recent N trace events.
    #[arg(long, value_name = "N")]
    trace_limit: Option<usize>,
}

#[derive(Args)]
struct ExploreArgs {
    /// Number of participants (2 or 3).
    #[arg(short = 'n', long, default_value_t = 3)]
    participants: usize,

    /// Exhaustive search depth, in ticks.
    #[arg(short, long, default_value_t = 12)]
    depth: usize,

    /// Number of random schedules to try.
    #[arg(long, default_value_t = 64)]
    seeds: u32,

    /// Length of each random schedule, in ticks.
    #[arg(short, long, default_value_t = 256)]
    ticks: u64,

    /// First PRNG seed (u32 integer or "entropy").
    ///
    /// Falls back to OSSIM_SEED env var, then default (42).
    #[arg(long)]
    seed: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Sched(args) => run_sched(args),
        Command::Mutex(args) => run_mutex(args),
        Command::Explore(args) => run_explore(args),
    }
}

fn run_sched(args: SchedArgs) -> Result<()> {
    let mut workload = match &args.workload {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            SchedWorkload::from_json(&json)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => SchedWorkload {
            policy: Policy::default(),
            jobs: Vec::new(),
            with_results_display: true,
            with_reset: true,
            srtf_quantum: None,
        },
    };
    for arg in &args.jobs {
        workload.jobs.push(parse_job_arg(arg)?);
    }
    if workload.jobs.is_empty() {
        for arg in ["P1:0:3", "P2:2:6", "P3:4:1"] {
            workload.jobs.push(parse_job_arg(arg)?);
        }
    }
    if let Some(policy) = args.policy {
        workload.policy = policy;
    }

    let policies: Vec<Policy> = if args.compare {
        Policy::ALL.to_vec()
    } else {
        vec![workload.policy]
    };

    for (i, policy) in policies.into_iter().enumerate() {
        let config = EngineConfig {
            policy,
            ..workload.config()
        };
        let mut engine = SchedulerEngine::new(config)?;
        engine.add_all(workload.jobs.clone())?;
        engine.run_to_completion();

        if i > 0 {
            println!();
        }
        println!("== {policy} ==");
        if let Some(report) = engine.report() {
            println!("{report}");
        }
        if args.dump_trace {
            engine.trace().dump();
        }
    }
    Ok(())
}

fn run_mutex(args: MutexArgs) -> Result<()> {
    let scenario = match &args.scenario {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            MutexScenarioFile::from_json(&json)
                .and_then(MutexScenarioFile::into_scenario)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => MutexScenario::builder()
            .participants(args.participants)
            .default_behavior(Behavior::Cyclic {
                critical_steps: args.critical_steps,
                rest_steps: args.rest_steps,
                cycles: args.cycles,
            })
            .build()?,
    };

    let mut sim = MutexSim::new(&scenario)?;
    sim.set_trace_limit(args.trace_limit);
    println!(
        "{} tellers, {} protocol, {} ticks",
        sim.participant_count(),
        sim.protocol(),
        args.ticks
    );
    for _ in 0..args.ticks {
        let report = sim.tick();
        if args.dump_trace {
            eprintln!("-- tick {} --\n{}", report.tick, sim.get_state());
        }
        if sim.all_finished() {
            break;
        }
    }
    if args.dump_trace {
        sim.trace().dump();
    }

    println!("{}", sim.starvation_report());
    match sim.monitor().first() {
        Some(v) => println!(
            "mutual exclusion violated {} times (first at tick {}, inside: {:?})",
            sim.violations(),
            v.tick,
            v.inside
        ),
        None => println!("mutual exclusion held"),
    }
    Ok(())
}

fn run_explore(args: ExploreArgs) -> Result<()> {
    let seed = match &args.seed {
        Some(s) => parse_seed(Some(s))?,
        None => seed_from_env()?,
    };
    let scenario = MutexScenario::builder()
        .participants(args.participants)
        .seed(seed)
        .build()?;
    let start = MutexSim::new(&scenario)?;

    let result = exhaustive(&start, args.depth);
    println!(
        "exhaustive: {} states, {}",
        result.states_visited,
        if result.complete {
            "complete"
        } else {
            "bounded"
        }
    );
    if let Some(cx) = &result.violation {
        println!("shortest counterexample ({} ticks):\n{cx}", cx.ticks());
    }

    let swept = sweep(&start, seed, args.seeds, args.ticks);
    println!(
        "random: {}/{} schedules violated exclusion (seeds from {seed})",
        swept.violating_seeds.len(),
        swept.runs
    );
    if let Some((s, cx)) = &swept.first {
        println!("first violating seed {s} ({} ticks)", cx.ticks());
    }

    if args.participants == 2 && (result.violation.is_some() || swept.first.is_some()) {
        bail!("two-participant protocol violated mutual exclusion");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .event_format(SimFormat)
        .try_init();
}
