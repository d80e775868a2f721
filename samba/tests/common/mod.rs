#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use samba::{Algorithm, ExecutionTime, InitialExploration, Timing, Trace, Turn};

/// A pull after the warm-up: the selected arm, its reward and the scores of all arms.
pub struct Pull {
    pub arm: usize,
    pub reward: f64,
    pub scores: Vec<f64>,
}

/// Builds a consistent trace from a warm-up and the pulls that follow it.
pub fn build_trace(initial_rewards: Vec<f64>, pulls: Vec<Pull>) -> Trace {
    let arm_count = initial_rewards.len();
    let budget = arm_count + pulls.len() - 1;
    let initial_pulls = vec![1; arm_count];

    let mut cumulative_pulls = initial_pulls.clone();
    let mut cumulative_rewards = initial_rewards.clone();
    let turns = pulls
        .into_iter()
        .enumerate()
        .map(|(offset, pull)| {
            cumulative_pulls[pull.arm] += 1;
            cumulative_rewards[pull.arm] += pull.reward;
            Turn {
                turn_number: (arm_count + offset + 1) as u32,
                selected_arm: pull.arm,
                reward: pull.reward,
                scores: pull.scores,
                cumulative_pulls: cumulative_pulls.clone(),
                cumulative_rewards: cumulative_rewards.clone(),
                cumulative_reward: cumulative_rewards.iter().sum(),
            }
        })
        .collect();

    Trace {
        algorithm: Algorithm::EpsilonGreedy,
        params: vec![],
        budget,
        execution_time: ExecutionTime {
            time: 1.0,
            budget: budget as u32,
        },
        initial_exploration: InitialExploration {
            pulls: initial_pulls,
            rewards: initial_rewards,
        },
        arm_count,
        probabilities: vec![0.5; arm_count],
        timing: Timing::default(),
        turns,
    }
}

/// A valid trace with random turns, reproducible from `seed`.
pub fn random_trace(seed: u64, arm_count: usize, budget: usize) -> Trace {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let initial_rewards = (0..arm_count)
        .map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 })
        .collect();
    let pulls = (0..Trace::expected_turn_count(arm_count, budget).unwrap_or(0))
        .map(|_| Pull {
            arm: rng.gen_range(0..arm_count),
            reward: if rng.gen_bool(0.4) { 1.0 } else { 0.0 },
            scores: (0..arm_count).map(|_| rng.gen_range(0.0..3.0)).collect(),
        })
        .collect();
    let mut trace = build_trace(initial_rewards, pulls);
    trace.algorithm = Algorithm::ALL[rng.gen_range(0..Algorithm::ALL.len())];
    trace
}

/// Three arms and a budget of 5. Turn 3 has `scores = [1.005, 2.0, 0.5]` and selects arm 1.
pub fn three_arm_trace() -> Trace {
    build_trace(
        vec![1.0, 0.0, 1.0],
        vec![
            Pull {
                arm: 1,
                reward: 1.0,
                scores: vec![1.005, 2.0, 0.5],
            },
            Pull {
                arm: 0,
                reward: 0.0,
                scores: vec![1.5, 1.25, 0.75],
            },
            Pull {
                arm: 1,
                reward: 1.0,
                scores: vec![1.0, 2.5, 0.5],
            },
        ],
    )
}
