//! Simulation data types.

use anyhow::Result;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::Serialize;

/// Disease category of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    AtRisk,
    Infected,
    Recovered,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::AtRisk, Category::Infected, Category::Recovered];

    pub fn index(self) -> usize {
        match self {
            Category::AtRisk => 0,
            Category::Infected => 1,
            Category::Recovered => 2,
        }
    }
}

/// Agent of the simulation.
///
/// The position is cosmetic: it is drawn once at creation and never used by
/// any transition rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    category: Category,
    pos: (f64, f64),
}

impl Agent {
    pub fn new(category: Category, pos: (f64, f64)) -> Self {
        Self { category, pos }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn pos(&self) -> (f64, f64) {
        self.pos
    }

    pub(crate) fn set_category(&mut self, category: Category) {
        self.category = category;
    }
}

/// Rectangular region agent positions are drawn from.
pub struct Canvas {
    x_dist: Uniform<f64>,
    y_dist: Uniform<f64>,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        Ok(Self {
            x_dist: Uniform::new(0.0, width)?,
            y_dist: Uniform::new(0.0, height)?,
        })
    }

    pub fn sample_pos<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        (self.x_dist.sample(rng), self.y_dist.sample(rng))
    }
}

/// Values of the three compartments at a single step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Compartments {
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
}

impl Compartments {
    pub fn total(&self) -> f64 {
        self.susceptible + self.infected + self.recovered
    }

    /// Check that every value is finite and lies in `[0, upper]`.
    pub fn within(&self, upper: f64) -> bool {
        [self.susceptible, self.infected, self.recovered]
            .iter()
            .all(|&val| val.is_finite() && (0.0..=upper).contains(&val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn canvas_positions_stay_inside() {
        let canvas = Canvas::new(550.0, 600.0).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        for _ in 0..1000 {
            let (x, y) = canvas.sample_pos(&mut rng);
            assert!((0.0..550.0).contains(&x));
            assert!((0.0..600.0).contains(&y));
        }
    }

    #[test]
    fn compartments_bounds() {
        let c = Compartments {
            susceptible: 990.0,
            infected: 10.0,
            recovered: 0.0,
        };
        assert_eq!(c.total(), 1000.0);
        assert!(c.within(1000.0));

        let negative = Compartments {
            infected: -1.0e-3,
            ..c
        };
        assert!(!negative.within(1000.0));

        let nan = Compartments {
            recovered: f64::NAN,
            ..c
        };
        assert!(!nan.within(1000.0));
    }

    #[test]
    fn category_indices_are_distinct() {
        let idx: Vec<_> = Category::ALL.iter().map(|c| c.index()).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }
}
