use crate::model::{Category, Compartments};
use crate::observer::{Frame, Observer};
use serde::Serialize;
use std::ops::ControlFlow;

/// Online mean and variance (Welford).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Agent counts per category.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentCounts {
    pub at_risk: usize,
    pub infected: usize,
    pub recovered: usize,
}

impl AgentCounts {
    fn tally(frame: &Frame) -> Self {
        let mut counts = Self::default();
        for agt in frame.agents {
            match agt.category() {
                Category::AtRisk => counts.at_risk += 1,
                Category::Infected => counts.infected += 1,
                Category::Recovered => counts.recovered += 1,
            }
        }
        counts
    }
}

/// Summary of a finished run.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub steps: usize,
    pub peak_infected: usize,
    pub peak_step: usize,
    pub n_unstable_steps: usize,
    pub n_reconciliation_anomalies: usize,
    pub infected: AccumulatorReport,
    /// Gap between the integrator's infected estimate and the agent count.
    pub infected_gap: AccumulatorReport,
    pub final_counts: AgentCounts,
    pub final_compartments: Option<Compartments>,
}

/// Observer collecting the data behind a [`Summary`].
pub struct Tracker {
    steps: usize,
    peak_infected: usize,
    peak_step: usize,
    infected: Accumulator,
    infected_gap: Accumulator,
    final_counts: AgentCounts,
    final_compartments: Option<Compartments>,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            steps: 0,
            peak_infected: 0,
            peak_step: 0,
            infected: Accumulator::new(),
            infected_gap: Accumulator::new(),
            final_counts: AgentCounts::default(),
            final_compartments: None,
        }
    }

    /// Build the summary. Instability and anomaly counts come from the engine.
    pub fn summary(self, n_unstable_steps: usize, n_reconciliation_anomalies: usize) -> Summary {
        Summary {
            steps: self.steps,
            peak_infected: self.peak_infected,
            peak_step: self.peak_step,
            n_unstable_steps,
            n_reconciliation_anomalies,
            infected: self.infected.report(),
            infected_gap: self.infected_gap.report(),
            final_counts: self.final_counts,
            final_compartments: self.final_compartments,
        }
    }
}

impl Observer for Tracker {
    fn on_frame(&mut self, frame: &Frame) -> ControlFlow<()> {
        let counts = AgentCounts::tally(frame);

        self.steps = frame.step;
        if counts.infected > self.peak_infected {
            self.peak_infected = counts.infected;
            self.peak_step = frame.step;
        }
        self.infected.add(counts.infected as f64);
        self.infected_gap
            .add((frame.estimated_infected - counts.infected as f64).abs());
        self.final_counts = counts;
        self.final_compartments = Some(*frame.compartments);

        ControlFlow::Continue(())
    }
}

/// Observer logging the progress of a run.
pub struct ProgressLogger {
    total_steps: usize,
    steps_per_report: usize,
}

impl ProgressLogger {
    pub fn new(total_steps: usize, steps_per_report: usize) -> Self {
        Self {
            total_steps,
            steps_per_report,
        }
    }
}

impl Observer for ProgressLogger {
    fn on_frame(&mut self, frame: &Frame) -> ControlFlow<()> {
        if frame.step % self.steps_per_report == 0 {
            let progress = 100.0 * frame.step as f64 / self.total_steps as f64;
            log::info!(
                "completed {progress:06.2}% (infected {:.0}, recovered {:.2})",
                frame.compartments.infected,
                frame.compartments.recovered
            );
        }
        ControlFlow::Continue(())
    }

    fn on_finished(&mut self, final_step: usize) {
        log::info!("finished after {final_step} of {} steps", self.total_steps);
    }
}
