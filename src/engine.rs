use crate::compartment::CompartmentModel;
use crate::config::Config;
use crate::model::Canvas;
use crate::observer::{Frame, Observer};
use crate::population::{Population, Trials};
use crate::reconcile::{Reconciler, SyncOutcome};
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Finished,
}

/// Simulation engine.
///
/// Owns the configuration, both simulation layers, the reconciler and the
/// random number generator, and sequences them one step at a time.
pub struct Engine {
    cfg: Config,
    model: CompartmentModel,
    pop: Population,
    reconciler: Reconciler,
    trials: Trials,
    canvas: Canvas,
    rng: ChaCha12Rng,
    total_steps: usize,
    phase: Phase,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a random initial state.
    ///
    /// The generator is seeded from `cfg.init.seed` when present and from the
    /// operating system otherwise.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.init.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let canvas = Canvas::new(cfg.init.canvas_width, cfg.init.canvas_height)
            .context("failed to construct canvas")?;
        let trials = Trials::new(&cfg).context("failed to construct trials")?;

        let pop = Population::generate(&cfg, &canvas, &mut rng);
        let model = CompartmentModel::new(&cfg);
        let reconciler = Reconciler::new(cfg.init.population);
        let total_steps = cfg.total_steps();

        Ok(Self {
            cfg,
            model,
            pop,
            reconciler,
            trials,
            canvas,
            rng,
            total_steps,
            phase: Phase::Running,
        })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn step(&self) -> usize {
        self.model.step()
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn model(&self) -> &CompartmentModel {
        &self.model
    }

    pub fn population(&self) -> &Population {
        &self.pop
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Run ticks until the engine finishes.
    pub fn run_simulation<O: Observer>(&mut self, mut obs: O) -> Result<()> {
        while self.tick(&mut obs)? == Phase::Running {}

        log::info!("simulation finished at step {}", self.step());
        Ok(())
    }

    /// Perform one step and hand the resulting frame to `obs`.
    ///
    /// Does nothing once the engine is finished.
    pub fn tick<O: Observer>(&mut self, obs: &mut O) -> Result<Phase> {
        if self.phase == Phase::Finished {
            return Ok(Phase::Finished);
        }

        let estimated_infected = self
            .perform_step()
            .with_context(|| format!("failed to perform step {}", self.step()))?;

        let frame = Frame {
            step: self.model.step(),
            agents: self.pop.agents(),
            compartments: self.model.current(),
            estimated_infected,
        };
        let flow = obs.on_frame(&frame);

        if flow.is_break() {
            log::info!("stop requested at step {}", self.step());
            self.stop(obs);
        } else if self.step() >= self.total_steps {
            self.stop(obs);
        }

        Ok(self.phase)
    }

    /// Finish the simulation between steps.
    pub fn stop<O: Observer>(&mut self, obs: &mut O) {
        if self.phase == Phase::Finished {
            return;
        }
        self.phase = Phase::Finished;
        obs.on_finished(self.step());
    }

    fn perform_step(&mut self) -> Result<f64> {
        // Integrate the compartment model.
        self.model.advance();
        let estimated_infected = self.model.current().infected;

        // Apply the per-agent trials.
        let tally = self.pop.advance(&self.trials, &mut self.rng);

        // Align both layers.
        let outcome = self
            .reconciler
            .sync(&mut self.model, &mut self.pop, &self.canvas, &mut self.rng)
            .context("failed to reconcile layers")?;

        if let SyncOutcome::Synced { n_spawned } = outcome {
            log::trace!(
                "step {}: {tally:?}, spawned {n_spawned} recovered",
                self.model.step()
            );
        }

        Ok(estimated_infected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::reference;
    use crate::model::{Agent, Category};
    use crate::observer::NoopObserver;
    use approx::assert_relative_eq;
    use std::ops::ControlFlow;

    /// Records the categories of every frame.
    #[derive(Default)]
    struct Recorder {
        frames: Vec<Vec<Category>>,
        n_finished: usize,
        stop_at: Option<usize>,
    }

    impl Observer for Recorder {
        fn on_frame(&mut self, frame: &Frame) -> ControlFlow<()> {
            self.frames
                .push(frame.agents.iter().map(Agent::category).collect());
            match self.stop_at {
                Some(step) if frame.step >= step => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        }

        fn on_finished(&mut self, _final_step: usize) {
            self.n_finished += 1;
        }
    }

    fn short(mut cfg: Config, duration: f64) -> Config {
        cfg.time.duration = duration;
        cfg
    }

    #[test]
    fn scenario_single_step() {
        let mut cfg = short(reference(), 0.01);
        cfg.model.birth_death_rate = 0.0;
        let mut engine = Engine::generate_initial_condition(cfg).unwrap();
        assert_eq!(engine.total_steps(), 1);

        let mut rec = Recorder::default();
        assert_eq!(engine.tick(&mut rec).unwrap(), Phase::Finished);

        let c = engine.model().current();
        assert_relative_eq!(c.susceptible, 989.999802, epsilon = 1e-9);
        assert_relative_eq!(c.recovered, 0.01, epsilon = 1e-12);
        let n_infected = engine.population().count(Category::Infected);
        assert_eq!(c.infected, n_infected as f64);
        assert!((9..=12).contains(&n_infected));
        assert_eq!(rec.frames.len(), 1);
        assert_eq!(rec.n_finished, 1);
    }

    #[test]
    fn seeded_runs_are_identical() {
        let cfg = short(reference(), 5.0);
        let mut rec_a = Recorder::default();
        let mut rec_b = Recorder::default();
        Engine::generate_initial_condition(cfg.clone())
            .unwrap()
            .run_simulation(&mut rec_a)
            .unwrap();
        Engine::generate_initial_condition(cfg)
            .unwrap()
            .run_simulation(&mut rec_b)
            .unwrap();
        assert_eq!(rec_a.frames.len(), 500);
        assert_eq!(rec_a.frames, rec_b.frames);
    }

    #[test]
    fn population_invariants_hold_every_step() {
        let mut cfg = short(reference(), 20.0);
        cfg.model.infection_rate = 0.5;
        cfg.model.recovery_rate = 0.5;
        cfg.model.birth_death_rate = 0.5;
        let mut engine = Engine::generate_initial_condition(cfg).unwrap();
        let mut obs = NoopObserver;

        let mut n_recovered = 0;
        while engine.tick(&mut obs).unwrap() == Phase::Running {
            let pop = engine.population();
            let n_live: usize = Category::ALL.iter().map(|&c| pop.count(c)).sum();
            assert_eq!(n_live, pop.len());
            assert!(n_live <= 1000);
            if pop.n_deaths() == 0 {
                assert_eq!(n_live, 1000);
            }

            assert!(pop.count(Category::Recovered) >= n_recovered);
            n_recovered = pop.count(Category::Recovered);

            assert_eq!(
                engine.model().current().infected,
                pop.count(Category::Infected) as f64
            );
        }
        assert!(n_recovered > 0);
        assert_eq!(engine.step(), 2000);
    }

    #[test]
    fn observer_can_stop_the_run() {
        let cfg = short(reference(), 1.0);
        let mut engine = Engine::generate_initial_condition(cfg).unwrap();
        let mut rec = Recorder {
            stop_at: Some(10),
            ..Default::default()
        };
        engine.run_simulation(&mut rec).unwrap();
        assert_eq!(engine.phase(), Phase::Finished);
        assert_eq!(engine.step(), 10);
        assert_eq!(rec.n_finished, 1);
    }

    #[test]
    fn finished_engine_ignores_ticks() {
        let cfg = short(reference(), 1.0);
        let mut engine = Engine::generate_initial_condition(cfg).unwrap();
        let mut rec = Recorder::default();
        engine.tick(&mut rec).unwrap();
        engine.stop(&mut rec);
        engine.stop(&mut rec);

        let agents = engine.population().agents().to_vec();
        assert_eq!(engine.tick(&mut rec).unwrap(), Phase::Finished);
        assert_eq!(engine.step(), 1);
        assert_eq!(engine.population().agents(), agents.as_slice());
        assert_eq!(rec.frames.len(), 1);
        assert_eq!(rec.n_finished, 1);
    }
}
