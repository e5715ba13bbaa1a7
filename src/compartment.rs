//! Continuous SIR model integrated with the explicit Euler method.

use crate::config::{Config, ModelConfig};
use crate::model::Compartments;

/// Rate of change of the susceptible compartment.
pub fn susceptible_rate(susceptible: f64, infected: f64, alpha: f64, n: f64) -> f64 {
    -alpha * susceptible * infected / n
}

/// Rate of change of the infected compartment.
pub fn infected_rate(susceptible: f64, infected: f64, alpha: f64, beta: f64, n: f64) -> f64 {
    alpha * susceptible * infected / n - beta * infected
}

/// Rate of change of the recovered compartment.
pub fn recovered_rate(infected: f64, beta: f64) -> f64 {
    beta * infected
}

/// Time derivative of the whole state.
pub fn derivative(c: &Compartments, model: &ModelConfig, n: f64) -> Compartments {
    let alpha = model.infection_rate;
    let beta = model.recovery_rate;
    Compartments {
        susceptible: susceptible_rate(c.susceptible, c.infected, alpha, n),
        infected: infected_rate(c.susceptible, c.infected, alpha, beta, n),
        recovered: recovered_rate(c.infected, beta),
    }
}

/// One explicit Euler step: `x + f(x) * h`.
pub fn euler_step(c: &Compartments, model: &ModelConfig, n: f64, h: f64) -> Compartments {
    let d = derivative(c, model, n);
    Compartments {
        susceptible: c.susceptible + d.susceptible * h,
        infected: c.infected + d.infected * h,
        recovered: c.recovered + d.recovered * h,
    }
}

/// Series of compartment values, one entry per step.
///
/// Entry 0 holds the initial condition. [`CompartmentModel::advance`] appends
/// exactly one entry, computed only from the previous one.
pub struct CompartmentModel {
    model: ModelConfig,
    n: f64,
    h: f64,
    series: Vec<Compartments>,
    n_unstable: usize,
}

impl CompartmentModel {
    pub fn new(cfg: &Config) -> Self {
        let n_infected = cfg.init.initial_infected as f64;
        let initial = Compartments {
            susceptible: cfg.init.population as f64 - n_infected,
            infected: n_infected,
            recovered: 0.0,
        };

        let series = vec![initial];

        Self {
            model: cfg.model.clone(),
            n: cfg.init.population as f64,
            h: cfg.time.step_size,
            series,
            n_unstable: 0,
        }
    }

    /// Index of the latest entry.
    pub fn step(&self) -> usize {
        self.series.len() - 1
    }

    pub fn current(&self) -> &Compartments {
        &self.series[self.step()]
    }

    /// Entry before the latest one, absent at step 0.
    pub fn previous(&self) -> Option<&Compartments> {
        self.step().checked_sub(1).map(|t| &self.series[t])
    }

    pub fn series(&self) -> &[Compartments] {
        &self.series
    }

    /// Number of steps whose values left `[0, N]` or were not finite.
    pub fn n_unstable(&self) -> usize {
        self.n_unstable
    }

    /// Integrate one step and return its index.
    pub fn advance(&mut self) -> usize {
        let next = euler_step(self.current(), &self.model, self.n, self.h);
        self.series.push(next);

        let t = self.step();
        if !next.within(self.n) {
            self.n_unstable += 1;
            log::warn!(
                "numerical instability at step {t}: {next:?} outside [0, {}] (step size {})",
                self.n,
                self.h
            );
        }
        t
    }

    /// Replace the infected value of the latest entry.
    pub fn overwrite_infected(&mut self, infected: f64) {
        let t = self.step();
        self.series[t].infected = infected;
    }
}
