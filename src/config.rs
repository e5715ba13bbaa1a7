use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Epidemiological rates.
    pub model: ModelConfig,
    /// Initial population.
    pub init: InitConfig,
    /// Time discretization.
    pub time: TimeConfig,
    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Infection rate (alpha).
    pub infection_rate: f64,
    /// Recovery rate (beta).
    pub recovery_rate: f64,
    /// Birth/death rate (gamma).
    pub birth_death_rate: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Total number of agents.
    pub population: usize,
    /// Number of agents infected at step 0.
    pub initial_infected: usize,
    /// Seed of the random number generator (OS entropy if absent).
    #[serde(default)]
    pub seed: Option<u64>,
    /// Width of the region agent positions are drawn from.
    #[serde(default = "default_canvas_width")]
    pub canvas_width: f64,
    /// Height of the region agent positions are drawn from.
    #[serde(default = "default_canvas_height")]
    pub canvas_height: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Integration step size.
    pub step_size: f64,
    /// Total simulated time.
    pub duration: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of steps between progress reports.
    #[serde(default = "default_steps_per_report")]
    pub steps_per_report: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            steps_per_report: default_steps_per_report(),
        }
    }
}

fn default_canvas_width() -> f64 {
    550.0
}

fn default_canvas_height() -> f64 {
    600.0
}

fn default_steps_per_report() -> usize {
    1000
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Number of integration steps in a run.
    pub fn total_steps(&self) -> usize {
        (self.time.duration / self.time.step_size).round() as usize
    }

    pub fn validate(&self) -> Result<()> {
        let h = self.time.step_size;
        check_num(h, f64::MIN_POSITIVE..).context("invalid step size")?;
        check_num(self.time.duration, h..=1.0e9).context("invalid duration")?;
        check_num(self.total_steps(), 1..=MAX_TOTAL_STEPS)
            .context("invalid number of steps")?;

        check_rate(self.model.infection_rate, h).context("invalid infection rate")?;
        check_rate(self.model.recovery_rate, h).context("invalid recovery rate")?;
        check_rate(self.model.birth_death_rate, h).context("invalid birth/death rate")?;

        check_num(self.init.population, 1..=10_000_000).context("invalid population")?;
        check_num(self.init.initial_infected, 0..=self.init.population)
            .context("invalid initial number of infected agents")?;
        check_num(self.init.canvas_width, f64::MIN_POSITIVE..=1.0e6)
            .context("invalid canvas width")?;
        check_num(self.init.canvas_height, f64::MIN_POSITIVE..=1.0e6)
            .context("invalid canvas height")?;

        check_num(self.output.steps_per_report, 1..)
            .context("invalid number of steps per report")?;

        Ok(())
    }
}

/// Upper bound on the number of steps, since the compartment series keeps
/// one entry per step in memory.
const MAX_TOTAL_STEPS: usize = 10_000_000;

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_rate(rate: f64, step_size: f64) -> Result<()> {
    check_num(rate, 0.0..f64::INFINITY)?;
    // Rates are turned into per-step trial probabilities.
    let prob = rate * step_size;
    if prob > 1.0 {
        bail!("rate times step size must be at most 1.0, but is {prob}");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const REFERENCE: &str = r#"
[model]
infection_rate = 0.002
recovery_rate = 0.1
birth_death_rate = 0.005

[init]
population = 1000
initial_infected = 10
seed = 7

[time]
step_size = 0.01
duration = 500.0
"#;

    pub(crate) fn reference() -> Config {
        Config::from_toml(REFERENCE).expect("reference config should be valid")
    }

    #[test]
    fn reference_config_uses_defaults() {
        let cfg = reference();
        assert_eq!(cfg.total_steps(), 50_000);
        assert_eq!(cfg.init.seed, Some(7));
        assert_eq!(cfg.init.canvas_width, 550.0);
        assert_eq!(cfg.init.canvas_height, 600.0);
        assert_eq!(cfg.output, OutputConfig::default());
    }

    #[test]
    fn rejects_negative_rate() {
        let mut cfg = reference();
        cfg.model.recovery_rate = -0.1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_too_many_initial_infected() {
        let mut cfg = reference();
        cfg.init.initial_infected = cfg.init.population + 1;
        assert!(cfg.validate().is_err());

        cfg.init.initial_infected = cfg.init.population;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_step_size() {
        let mut cfg = reference();
        cfg.time.step_size = 0.0;
        assert!(cfg.validate().is_err());
        cfg.time.step_size = -0.01;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_trial_probability_above_one() {
        let mut cfg = reference();
        cfg.model.infection_rate = 150.0;
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").contains("at most 1.0"));

        cfg.model.infection_rate = 50.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn accepts_step_size_above_one() {
        let mut cfg = reference();
        cfg.time.step_size = 2.0;
        cfg.model.infection_rate = 0.002;
        cfg.model.recovery_rate = 0.5;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.total_steps(), 250);

        cfg.model.recovery_rate = 0.6;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_too_many_steps() {
        let mut cfg = reference();
        cfg.time.step_size = 1.0e-5;
        assert_eq!(cfg.total_steps(), 50_000_000);
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").contains("invalid number of steps"));

        cfg.time.step_size = 1.0e-4;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_missing_section() {
        let contents = REFERENCE.replace("[time]", "[timing]");
        assert!(Config::from_toml(&contents).is_err());
    }
}
