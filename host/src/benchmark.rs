use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use torus_core::Difficulty;

use crate::bots::create_bot;
use crate::runner::{run_bot, RunMetrics};

#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub bots: Vec<String>,
    pub seeds: Vec<u32>,
    pub difficulty: Difficulty,
    pub max_ticks: u64,
    pub jobs: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BotAggregate {
    pub bot_id: String,
    pub runs: usize,
    pub avg_score: f64,
    pub max_score: u64,
    pub avg_time: f64,
    pub max_level: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct BenchmarkReport {
    pub runs: Vec<RunMetrics>,
    pub rankings: Vec<BotAggregate>,
}

pub fn run_benchmark(config: &BenchmarkConfig) -> Result<BenchmarkReport> {
    if config.seeds.is_empty() {
        return Err(anyhow!("benchmark requires at least one seed"));
    }
    if config.bots.is_empty() {
        return Err(anyhow!("benchmark requires at least one bot"));
    }
    if let Some(bot) = config.bots.iter().find(|bot| create_bot(bot).is_none()) {
        return Err(anyhow!("unknown bot '{bot}'"));
    }
    if config.jobs == Some(0) {
        return Err(anyhow!("benchmark --jobs must be >= 1 when provided"));
    }

    let run_jobs: Vec<(&str, u32)> = config
        .bots
        .iter()
        .flat_map(|bot| config.seeds.iter().map(move |seed| (bot.as_str(), *seed)))
        .collect();

    let run_one = |(bot_id, seed): &(&str, u32)| -> Result<RunMetrics> {
        run_bot(bot_id, *seed, config.difficulty, config.max_ticks)
            .map(|artifact| artifact.metrics)
            .with_context(|| format!("benchmark run failed for bot={bot_id} seed={seed:#x}"))
    };

    let results: Vec<Result<RunMetrics>> = match config.jobs {
        Some(jobs) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .context("failed to build rayon threadpool")?;
            pool.install(|| run_jobs.par_iter().map(run_one).collect())
        }
        None => run_jobs.par_iter().map(run_one).collect(),
    };
    let runs = results.into_iter().collect::<Result<Vec<_>>>()?;

    let mut grouped: BTreeMap<&str, Vec<&RunMetrics>> = BTreeMap::new();
    for run in &runs {
        grouped.entry(run.bot_id.as_str()).or_default().push(run);
    }

    let mut rankings: Vec<BotAggregate> = grouped
        .into_iter()
        .map(|(bot_id, bot_runs)| {
            let count = bot_runs.len() as f64;
            BotAggregate {
                bot_id: bot_id.to_string(),
                runs: bot_runs.len(),
                avg_score: bot_runs.iter().map(|r| r.final_score as f64).sum::<f64>() / count,
                max_score: bot_runs.iter().map(|r| r.final_score).max().unwrap_or_default(),
                avg_time: bot_runs.iter().map(|r| r.final_time as f64).sum::<f64>() / count,
                max_level: bot_runs.iter().map(|r| r.final_level).max().unwrap_or_default(),
            }
        })
        .collect();
    rankings.sort_by(|a, b| b.avg_score.total_cmp(&a.avg_score));

    tracing::info!(runs = runs.len(), bots = rankings.len(), "benchmark finished");
    Ok(BenchmarkReport { runs, rankings })
}
