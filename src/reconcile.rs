use crate::compartment::CompartmentModel;
use crate::model::{Agent, Canvas, Category};
use crate::population::Population;
use anyhow::{Context, Result};
use rand::Rng;

/// Result of a reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The step was reconciled and `n_spawned` recovered agents were added.
    Synced { n_spawned: usize },
    /// The step had already been reconciled; nothing changed.
    AlreadySynced,
}

/// Aligns the compartment model and the agent population after a step.
///
/// The agent population is authoritative for the infected value, the
/// compartment model for the growth of the recovered compartment.
pub struct Reconciler {
    n_total: usize,
    last_step: Option<usize>,
    n_anomalies: usize,
}

impl Reconciler {
    pub fn new(n_total: usize) -> Self {
        Self {
            n_total,
            last_step: None,
            n_anomalies: 0,
        }
    }

    /// Number of steps whose recovered delta was negative.
    pub fn n_anomalies(&self) -> usize {
        self.n_anomalies
    }

    /// Reconcile the latest step of `model` with `pop`.
    ///
    /// Overwrites the infected value with the infected agent count, then adds
    /// `floor(delta)` recovered agents, `delta` being the growth of the
    /// recovered compartment over the step. A negative `delta` is reported
    /// and treated as zero. Spawned agents never push the number of live
    /// agents above the total population.
    ///
    /// Reconciling the same step twice is a no-op.
    pub fn sync<R: Rng + ?Sized>(
        &mut self,
        model: &mut CompartmentModel,
        pop: &mut Population,
        canvas: &Canvas,
        rng: &mut R,
    ) -> Result<SyncOutcome> {
        let step = model.step();
        if self.last_step == Some(step) {
            log::debug!("step {step} already reconciled");
            return Ok(SyncOutcome::AlreadySynced);
        }

        let prev_recovered = model
            .previous()
            .context("no integrated step to reconcile")?
            .recovered;

        model.overwrite_infected(pop.count(Category::Infected) as f64);

        let delta = model.current().recovered - prev_recovered;
        let n_requested = if delta >= 0.0 {
            delta.floor() as usize
        } else {
            self.n_anomalies += 1;
            log::warn!("negative recovered delta {delta} at step {step}, spawning no agents");
            0
        };

        let headroom = self.n_total.saturating_sub(pop.len());
        let n_spawned = n_requested.min(headroom);
        if n_spawned < n_requested {
            log::debug!("step {step}: capped recovered spawns from {n_requested} to {n_spawned}");
        }
        for _ in 0..n_spawned {
            pop.add(Agent::new(Category::Recovered, canvas.sample_pos(rng)));
        }

        self.last_step = Some(step);
        Ok(SyncOutcome::Synced { n_spawned })
    }
}
