//! Execution time estimates for the secure and the unsecure protocol.
//!
//! The estimates scale the measured component times linearly with the budget and add the cost of
//! every enabled security primitive. They are display-only and do not influence the replay.

use serde::{Deserialize, Serialize};

use crate::{message::SecurityOptions, trace::Trace};

/// The estimated time of a run with a given budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    /// The budget of the run.
    pub budget: usize,
    /// Seconds without any security layer.
    pub unsecure: f64,
    /// Seconds with the selected security layers.
    pub secure: f64,
}

/// Estimates execution times from the constants of a trace.
#[derive(Debug, Clone, Copy)]
pub struct TimeEstimator<'t> {
    trace: &'t Trace,
}

impl<'t> TimeEstimator<'t> {
    /// Creates an estimator for `trace`.
    pub fn new(trace: &'t Trace) -> Self {
        Self { trace }
    }

    /// Time of one unsecure run at the measured budget, summed over all components.
    pub fn component_time(&self) -> f64 {
        let components = &self.trace.timing.components;
        components.arms.iter().sum::<f64>()
            + components.controller
            + components.comp
            + components.customer
    }

    /// Unsecure time at `budget`, interpolated from the measurement.
    pub fn unsecure(&self, budget: usize) -> f64 {
        let measured = self.trace.execution_time.budget;
        if measured == 0 {
            return 0.0;
        }
        budget as f64 * self.component_time() / f64::from(measured)
    }

    /// Added cost of the enabled security layers at `budget`.
    pub fn overhead(&self, budget: usize, options: SecurityOptions) -> f64 {
        let security = &self.trace.timing.security;
        let arms = self.trace.arm_count as f64;
        let budget = budget as f64;
        let mut overhead = 0.0;
        if options.mask {
            overhead += security.mask * arms * budget;
        }
        if options.aes {
            overhead += 2.0 * (security.aes.encryption + security.aes.decryption) * arms * budget;
        }
        if options.permutation {
            overhead += 2.0 * security.permutation * budget;
        }
        if options.paillier {
            overhead += security.paillier.encryption * arms
                + security.paillier.addition * (arms - 1.0)
                + security.paillier.decryption;
        }
        overhead
    }

    /// Secure time at `budget`.
    pub fn secure(&self, budget: usize, options: SecurityOptions) -> f64 {
        self.unsecure(budget) + self.overhead(budget, options)
    }

    /// One point per budget in `0..=budget` of the trace.
    pub fn curve(&self, options: SecurityOptions) -> Vec<TimingPoint> {
        (0..=self.trace.budget)
            .map(|budget| TimingPoint {
                budget,
                unsecure: self.unsecure(budget),
                secure: self.secure(budget, options),
            })
            .collect()
    }

    /// The largest time on any curve of this trace: every layer on, at the full budget.
    pub fn max_time(&self) -> f64 {
        self.secure(self.trace.budget, SecurityOptions::all())
    }

    /// Measured time of the trace plus the cost of every security layer at its budget.
    pub fn history_secure_time(&self) -> f64 {
        self.trace.execution_time.time + self.overhead(self.trace.budget, SecurityOptions::all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{
        Algorithm, AesTimes, ComponentTimes, ExecutionTime, InitialExploration, PaillierTimes,
        SecurityTimes, Timing,
    };

    fn trace() -> Trace {
        Trace {
            algorithm: Algorithm::EpsilonGreedy,
            params: vec![],
            budget: 2,
            execution_time: ExecutionTime {
                time: 1.5,
                budget: 10,
            },
            initial_exploration: InitialExploration {
                pulls: vec![1, 1],
                rewards: vec![0.0, 1.0],
            },
            arm_count: 2,
            probabilities: vec![0.1, 0.9],
            timing: Timing {
                components: ComponentTimes {
                    arms: vec![1.0, 2.0],
                    comp: 3.0,
                    controller: 4.0,
                    customer: 0.0,
                },
                security: SecurityTimes {
                    aes: AesTimes {
                        encryption: 0.25,
                        decryption: 0.25,
                    },
                    mask: 0.5,
                    paillier: PaillierTimes {
                        addition: 1.0,
                        decryption: 2.0,
                        encryption: 3.0,
                    },
                    permutation: 0.5,
                },
            },
            turns: vec![],
        }
    }

    #[test]
    fn test_unsecure_scales_with_budget() {
        let trace = trace();
        let estimator = TimeEstimator::new(&trace);
        assert_eq!(estimator.component_time(), 10.0);
        assert_eq!(estimator.unsecure(0), 0.0);
        assert_eq!(estimator.unsecure(5), 5.0);
    }

    #[test]
    fn test_overheads() {
        let trace = trace();
        let estimator = TimeEstimator::new(&trace);
        let only = |f: fn(&mut SecurityOptions)| {
            let mut options = SecurityOptions::none();
            f(&mut options);
            estimator.overhead(2, options)
        };
        assert_eq!(only(|o| o.mask = true), 2.0);
        assert_eq!(only(|o| o.aes = true), 4.0);
        assert_eq!(only(|o| o.permutation = true), 2.0);
        assert_eq!(only(|o| o.paillier = true), 9.0);
        assert_eq!(estimator.max_time(), 2.0 + 17.0);
        assert_eq!(estimator.history_secure_time(), 1.5 + 17.0);
    }

    #[test]
    fn test_curve_covers_every_budget() {
        let trace = trace();
        let curve = TimeEstimator::new(&trace).curve(SecurityOptions::none());
        assert_eq!(curve.len(), 3);
        assert_eq!(curve[2].secure, curve[2].unsecure);
    }
}
