//! Epidemic simulation coupling a compartmental SIR model, integrated with the
//! explicit Euler method, to a population of agents driven by Bernoulli trials.
//!
//! [`engine::Engine`] owns both layers and advances them in lock-step:
//! the compartment model first, then the agents, then the reconciliation that
//! feeds the infected agent count back into the model and turns its recovered
//! growth into new recovered agents.

pub mod compartment;
pub mod config;
pub mod engine;
pub mod model;
pub mod observer;
pub mod population;
pub mod reconcile;
pub mod stats;
