//! Run Orchestrator
//!
//! Runs an ordered stage list through the stage simulator, stopping at the
//! first failure, and repeats whole sequences in parallel for distribution
//! analysis.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use super::config::{SimulatorSettings, Stage};
use super::stage::simulate_stage;
use crate::types::{RepeatedRuns, SequenceOutcome, StageOutcome};

/// Run stages in order with a caller-supplied stage runner
///
/// Stops after the first failed stage; later stages are never run.
/// Signup fees of every stage that ran are charged in the totals.
pub fn run_sequence_with<F>(stages: &[Stage], mut run_stage: F) -> SequenceOutcome
where
    F: FnMut(&Stage) -> StageOutcome,
{
    let mut outcomes = Vec::with_capacity(stages.len());
    let mut total_withdrawable = 0.0;
    let mut total_hedge_profit = 0.0;
    let mut total_signup_fee = 0.0;
    let mut total_days = 0u32;

    for stage in stages {
        let outcome = run_stage(stage);

        total_withdrawable += outcome.withdrawable;
        total_hedge_profit += outcome.hedge_pnl;
        total_signup_fee += outcome.signup_fee;
        total_days += outcome.days_elapsed;

        let passed = outcome.passed();
        outcomes.push(outcome);
        if !passed {
            break;
        }
    }

    SequenceOutcome {
        stopped_at: outcomes.len().saturating_sub(1),
        stages: outcomes,
        total_withdrawable,
        total_hedge_profit,
        total_signup_fee,
        total_days,
        combined_result: total_withdrawable + total_hedge_profit - total_signup_fee,
    }
}

/// Run one full challenge
pub fn run_sequence<R: Rng>(stages: &[Stage], settings: SimulatorSettings, rng: &mut R) -> SequenceOutcome {
    run_sequence_with(stages, |stage| simulate_stage(stage, settings, rng))
}

/// Random stream for one trial: same seed, distinct ChaCha stream per trial
pub fn trial_rng(seed: u64, trial: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(trial as u64);
    rng
}

/// Repeat the full sequence `runs` times in parallel
///
/// Each trial draws from its own stream, so the samples depend only on
/// `seed` and never on thread scheduling.
pub fn run_repeated(stages: &[Stage], runs: usize, seed: u64, settings: SimulatorSettings) -> RepeatedRuns {
    info!("Running {} sequences of {} stages (seed {})", runs, stages.len(), seed);

    let completed = AtomicUsize::new(0);
    let report_every = (runs / 10).max(1);
    let start = std::time::Instant::now();

    let samples: Vec<(f64, u32, usize)> = (0..runs)
        .into_par_iter()
        .map(|trial| {
            let mut rng = trial_rng(seed, trial);
            let sequence = run_sequence(stages, settings, &mut rng);

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % report_every == 0 {
                info!("[{}/{}] sequences complete", done, runs);
            }

            (sequence.combined_result, sequence.total_days, sequence.stopped_at)
        })
        .collect();

    let mut results = RepeatedRuns {
        combined_results: Vec::with_capacity(runs),
        total_days: Vec::with_capacity(runs),
        stopped_at: Vec::with_capacity(runs),
        stage_reached: vec![0; stages.len()],
    };
    for (combined, days, stopped_at) in samples {
        results.combined_results.push(combined);
        results.total_days.push(days);
        results.stopped_at.push(stopped_at);
        if let Some(count) = results.stage_reached.get_mut(stopped_at) {
            *count += 1;
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "Completed {} sequences in {:.1}s ({:.0} runs/second)",
        runs,
        elapsed,
        runs as f64 / elapsed.max(f64::EPSILON)
    );

    results
}
