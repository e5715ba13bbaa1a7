use crate::config::Config;
use crate::model::{Agent, Canvas, Category};
use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};

/// Per-step Bernoulli trials derived from the model rates.
///
/// Each rate is turned into the probability `rate * step_size`, which only
/// approximates the continuous rate while it is much smaller than one.
pub struct Trials {
    infection: Bernoulli,
    recovery: Bernoulli,
    death: Bernoulli,
}

impl Trials {
    pub fn new(cfg: &Config) -> Result<Self> {
        let h = cfg.time.step_size;
        let prob = |rate: f64| rate * h;
        Ok(Self {
            infection: Bernoulli::new(prob(cfg.model.infection_rate))
                .context("invalid infection probability")?,
            recovery: Bernoulli::new(prob(cfg.model.recovery_rate))
                .context("invalid recovery probability")?,
            death: Bernoulli::new(prob(cfg.model.birth_death_rate))
                .context("invalid death probability")?,
        })
    }
}

/// Outcome of advancing the population by one step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepTally {
    pub n_infected: usize,
    pub n_recovered: usize,
    pub n_died: usize,
}

/// Collection of all live agents.
pub struct Population {
    agt_vec: Vec<Agent>,
    counts: [usize; 3],
    n_deaths: usize,
    i_agt_dec: Vec<usize>,
}

impl Population {
    fn empty() -> Self {
        Self {
            agt_vec: Vec::new(),
            counts: [0; 3],
            n_deaths: 0,
            i_agt_dec: Vec::new(),
        }
    }

    /// Create the initial population: `initial_infected` infected agents and
    /// the rest at risk, all at random positions.
    pub fn generate<R: Rng + ?Sized>(cfg: &Config, canvas: &Canvas, rng: &mut R) -> Self {
        let mut pop = Self::empty();
        pop.agt_vec.reserve(cfg.init.population);
        for i_agt in 0..cfg.init.population {
            let category = if i_agt < cfg.init.initial_infected {
                Category::Infected
            } else {
                Category::AtRisk
            };
            pop.add(Agent::new(category, canvas.sample_pos(rng)));
        }
        pop
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agt_vec
    }

    pub fn len(&self) -> usize {
        self.agt_vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agt_vec.is_empty()
    }

    pub fn count(&self, category: Category) -> usize {
        self.counts[category.index()]
    }

    /// Number of agents removed by death trials so far.
    pub fn n_deaths(&self) -> usize {
        self.n_deaths
    }

    pub fn add(&mut self, agt: Agent) {
        self.counts[agt.category().index()] += 1;
        self.agt_vec.push(agt);
    }

    /// Remove the agent at `i_agt`. The last agent takes its place.
    pub fn remove(&mut self, i_agt: usize) -> Agent {
        let agt = self.agt_vec.swap_remove(i_agt);
        self.counts[agt.category().index()] -= 1;
        agt
    }

    /// Apply one step of Bernoulli trials to every agent.
    ///
    /// Infected agents always draw a recovery trial and then a death trial.
    /// If the death trial succeeds the agent is removed, whatever the recovery
    /// trial gave. At-risk agents draw a single infection trial. Recovered
    /// agents draw nothing.
    pub fn advance<R: Rng + ?Sized>(&mut self, trials: &Trials, rng: &mut R) -> StepTally {
        let mut tally = StepTally::default();
        let mut i_agt_dec = std::mem::take(&mut self.i_agt_dec);
        i_agt_dec.clear();

        for (i_agt, agt) in self.agt_vec.iter_mut().enumerate() {
            match agt.category() {
                Category::Infected => {
                    let recovers = trials.recovery.sample(rng);
                    let dies = trials.death.sample(rng);
                    if dies {
                        i_agt_dec.push(i_agt);
                    } else if recovers {
                        agt.set_category(Category::Recovered);
                        self.counts[Category::Infected.index()] -= 1;
                        self.counts[Category::Recovered.index()] += 1;
                        tally.n_recovered += 1;
                    }
                }
                Category::AtRisk => {
                    if trials.infection.sample(rng) {
                        agt.set_category(Category::Infected);
                        self.counts[Category::AtRisk.index()] -= 1;
                        self.counts[Category::Infected.index()] += 1;
                        tally.n_infected += 1;
                    }
                }
                Category::Recovered => {}
            }
        }

        // Indices are ascending, so removing in reverse keeps them valid.
        for &i_agt in i_agt_dec.iter().rev() {
            self.remove(i_agt);
        }
        tally.n_died = i_agt_dec.len();
        self.n_deaths += tally.n_died;

        self.i_agt_dec = i_agt_dec;
        tally
    }
}
