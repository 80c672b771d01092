//! A minimal self-replicating organism used by the CLI and the test suite.
//!
//! The ancestor eats from the first resource at its cell, earns merit when a
//! meal is large enough, and copies itself once its gestation is complete.
//! Copies occasionally found a new genotype so lineages branch.

use petri_core::{BirthRequest, ExecutionContext, ExecutionOutcome, Hardware};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AncestorParams {
    /// Slices between births.
    pub gestation: u64,
    /// Cycles reported per slice.
    pub cycles_per_slice: u64,
    /// Amount requested from resource 0 each slice.
    pub appetite: f64,
    /// Merit gained when a full meal was available.
    pub meal_merit: f64,
    /// Probability that an offspring founds a new genotype.
    pub mutation_rate: f64,
    /// Slices lived before dying; 0 means immortal.
    pub lifespan: u64,
}

impl Default for AncestorParams {
    fn default() -> Self {
        Self {
            gestation: 10,
            cycles_per_slice: 10,
            appetite: 0.5,
            meal_merit: 0.1,
            mutation_rate: 0.05,
            lifespan: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ancestor {
    params: AncestorParams,
    progress: u64,
    rng: ChaCha8Rng,
}

impl Ancestor {
    pub fn new(params: AncestorParams, seed: u64) -> Self {
        Self {
            params,
            progress: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn boxed(params: AncestorParams, seed: u64) -> Box<dyn Hardware> {
        Box::new(Self::new(params, seed))
    }

    pub fn params(&self) -> &AncestorParams {
        &self.params
    }
}

impl Hardware for Ancestor {
    fn execute(&mut self, ctx: &ExecutionContext<'_>) -> ExecutionOutcome {
        let mut out = ExecutionOutcome {
            consumed_cycles: self.params.cycles_per_slice,
            ..ExecutionOutcome::default()
        };

        if let Some(&available) = ctx.resources.first() {
            if self.params.appetite > 0.0 {
                out.resource_requests.push((0, self.params.appetite));
                if available >= self.params.appetite {
                    out.merit_delta = self.params.meal_merit;
                    out.tasks.push(0);
                }
            }
        }

        self.progress += 1;
        if self.params.gestation > 0 && self.progress >= self.params.gestation {
            self.progress = 0;
            let mut request = BirthRequest::clone_of(self.replicate());
            request.novel_genotype = self.rng.gen_bool(self.params.mutation_rate.clamp(0.0, 1.0));
            out.birth_requests.push(request);
        }

        // ctx.age counts slices before this one
        out.is_dead = self.params.lifespan > 0 && ctx.age + 1 >= self.params.lifespan;
        out
    }

    fn replicate(&self) -> Box<dyn Hardware> {
        let mut rng = self.rng.clone();
        Box::new(Self::new(self.params, rng.gen()))
    }

    fn kind(&self) -> &str {
        "ancestor"
    }
}
