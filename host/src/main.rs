use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use host::benchmark::{run_benchmark, BenchmarkConfig};
use host::bots::{bot_ids, create_bot, describe_bots};
use host::util::{parse_seed, parse_seed_list, seed_to_hex};
use host::{read_proof, run_bot, write_proof, Driver};
use tokio::time::MissedTickBehavior;
use torus_core::{
    verify_with_limits, Difficulty, EngineSnapshot, GameOverPayload, Session, SessionObserver,
    VerifyLimits,
};

#[derive(Parser, Debug)]
#[command(name = "torus-host")]
#[command(about = "Headless driver for the torus puzzle: autoplay, replay proofs and verification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available bots
    ListBots,
    /// Play one seeded run headless and write its replay proof
    Generate {
        #[arg(long)]
        bot: String,
        /// Decimal, 0x-prefixed hex, or daily:<challenge-id>
        #[arg(long)]
        seed: String,
        #[arg(long, value_enum, default_value_t = CliDifficulty::Normal)]
        difficulty: CliDifficulty,
        #[arg(long, default_value_t = 500_000)]
        max_ticks: u64,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay a proof file through the verification oracle
    Verify {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        max_final_time: Option<u64>,
        #[arg(long)]
        max_inputs: Option<usize>,
    },
    /// Drive a live session on the wall clock with a bot at the controls
    Play {
        #[arg(long)]
        bot: String,
        /// Omit for a casual run without a replay proof
        #[arg(long)]
        seed: Option<String>,
        #[arg(long, value_enum, default_value_t = CliDifficulty::Normal)]
        difficulty: CliDifficulty,
        #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run every bot over a set of seeds and rank them by average score
    Benchmark {
        /// Comma separated bot ids; all bots when omitted
        #[arg(long)]
        bots: Option<String>,
        /// Comma separated seeds; `a..b` expands to a range
        #[arg(long, default_value = "1..13")]
        seeds: String,
        #[arg(long, value_enum, default_value_t = CliDifficulty::Normal)]
        difficulty: CliDifficulty,
        #[arg(long, default_value_t = 500_000)]
        max_ticks: u64,
        #[arg(long)]
        jobs: Option<usize>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliDifficulty {
    Normal,
    Rotate,
    Flip,
}

impl From<CliDifficulty> for Difficulty {
    fn from(value: CliDifficulty) -> Self {
        match value {
            CliDifficulty::Normal => Difficulty::Normal,
            CliDifficulty::Rotate => Difficulty::Rotate,
            CliDifficulty::Flip => Difficulty::Flip,
        }
    }
}

/// Logs a progress line every `every` ticks and once at game over.
struct ProgressLog {
    every: u64,
}

impl SessionObserver for ProgressLog {
    fn on_frame(&mut self, frame: &EngineSnapshot) {
        if frame.time > 0 && frame.time % self.every == 0 {
            tracing::info!(
                time = frame.time,
                score = frame.score,
                level = frame.level,
                cols = frame.num_cols,
                "progress"
            );
        }
    }

    fn on_game_over(&mut self, payload: GameOverPayload) {
        tracing::info!(score = payload.score, level = payload.level, "run ended");
    }
}

fn require_bot(bot: &str) -> Result<()> {
    if create_bot(bot).is_none() {
        let available = bot_ids().join(", ");
        return Err(anyhow!("unknown bot '{bot}'. available: {available}"));
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Commands::ListBots => {
            for (id, description) in describe_bots() {
                println!("{id:12} {description}");
            }
        }
        Commands::Generate {
            bot,
            seed,
            difficulty,
            max_ticks,
            output,
        } => {
            require_bot(&bot)?;
            let seed = parse_seed(&seed)?;
            let artifact = run_bot(&bot, seed, difficulty.into(), max_ticks)?;
            let output_path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "proofs/{}-{}-score{}-t{}.json",
                    bot,
                    seed_to_hex(seed).replace("0x", "seed"),
                    artifact.metrics.final_score,
                    artifact.metrics.final_time
                ))
            });
            write_proof(&output_path, &artifact.proof)?;

            println!("bot={}", artifact.metrics.bot_id);
            println!("seed={}", seed_to_hex(seed));
            println!("difficulty={}", artifact.metrics.difficulty);
            println!("time={}", artifact.metrics.final_time);
            println!("score={}", artifact.metrics.final_score);
            println!("level={}", artifact.metrics.final_level);
            println!("moves={}", artifact.metrics.moves);
            println!("applied_moves={}", artifact.metrics.applied_moves);
            println!("output={}", output_path.display());
        }
        Commands::Verify {
            input,
            max_final_time,
            max_inputs,
        } => {
            let proof = read_proof(&input)?;
            let defaults = VerifyLimits::default();
            let limits = VerifyLimits::new(
                max_final_time.unwrap_or(defaults.max_final_time),
                max_inputs.unwrap_or(defaults.max_inputs),
            );
            let result = verify_with_limits(&proof, limits);

            println!("seed={}", seed_to_hex(proof.seed));
            println!("difficulty={}", proof.difficulty);
            println!("inputs={}", proof.inputs.len());
            println!("claimed_time={}", result.expected.time);
            println!("claimed_score={}", result.expected.score);
            println!("claimed_level={}", result.expected.level);
            println!("replayed_time={}", result.actual.time);
            println!("replayed_score={}", result.actual.score);
            println!("replayed_level={}", result.actual.level);
            println!("ok={}", result.ok);
            if let Some(reason) = result.reason {
                println!("reason={reason}");
                return Err(anyhow!("replay rejected: {reason}"));
            }
        }
        Commands::Play {
            bot,
            seed,
            difficulty,
            interval_ms,
            output,
        } => {
            require_bot(&bot)?;
            let seed = seed.as_deref().map(parse_seed).transpose()?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to build tokio runtime")?;
            runtime.block_on(play(
                &bot,
                seed,
                difficulty.into(),
                Duration::from_millis(interval_ms),
                output,
            ))?;
        }
        Commands::Benchmark {
            bots,
            seeds,
            difficulty,
            max_ticks,
            jobs,
            output,
        } => {
            let bots = match bots {
                Some(list) => list
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect(),
                None => bot_ids().into_iter().map(str::to_string).collect(),
            };
            let report = run_benchmark(&BenchmarkConfig {
                bots,
                seeds: parse_seed_list(&seeds)?,
                difficulty: difficulty.into(),
                max_ticks,
                jobs,
            })?;

            for (rank, bot) in report.rankings.iter().enumerate() {
                println!(
                    "rank={} bot={} runs={} avg_score={:.1} max_score={} avg_time={:.0} max_level={}",
                    rank + 1,
                    bot.bot_id,
                    bot.runs,
                    bot.avg_score,
                    bot.max_score,
                    bot.avg_time,
                    bot.max_level
                );
            }
            if let Some(path) = output {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, serde_json::to_vec_pretty(&report)?)
                    .with_context(|| format!("failed writing {}", path.display()))?;
                println!("output={}", path.display());
            }
        }
    }

    Ok(())
}

async fn play(
    bot_id: &str,
    seed: Option<u32>,
    difficulty: Difficulty,
    period: Duration,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut bot = create_bot(bot_id).ok_or_else(|| anyhow!("unknown bot '{bot_id}'"))?;
    let mut session = Session::new(difficulty);
    session.subscribe(Box::new(ProgressLog { every: 500 }));

    let mut driver = Driver::new(session, period);
    driver.start_new_game(difficulty, seed).await;
    let shared = driver.session();

    // The bot gets one decision per tick period, between engine ticks.
    let mut controls = tokio::time::interval(period);
    controls.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        controls.tick().await;
        let mut session = shared.lock().await;
        if !session.engine().is_running() {
            break;
        }
        if let Some(mv) = bot.next_move(session.engine()) {
            session.dispatch(mv);
        }
    }

    let proof = shared.lock().await.replay_proof().cloned();
    let snapshot = driver.shutdown().await;

    println!("bot={bot_id}");
    if let Some(seed) = seed {
        println!("seed={}", seed_to_hex(seed));
    }
    println!("time={}", snapshot.engine.time);
    println!("score={}", snapshot.engine.score);
    println!("level={}", snapshot.engine.level);

    match (proof, output) {
        (Some(proof), Some(path)) => {
            write_proof(&path, &proof)?;
            println!("moves={}", proof.inputs.len());
            println!("output={}", path.display());
        }
        (Some(proof), None) => println!("moves={}", proof.inputs.len()),
        (None, Some(_)) => {
            return Err(anyhow!("casual runs have no replay proof; pass --seed to record one"))
        }
        (None, None) => {}
    }
    Ok(())
}
