pub mod macros;

use petri_core::config::ReplicationTrigger;
use petri_core::{
    AppConfig, BirthRequest, ExecutionContext, ExecutionOutcome, Hardware, Population,
    SchedulePolicy,
};
use petri_data::{Geometry, ResourceDef};

/// Hardware whose behaviour is fixed up front: divide every `period` slices,
/// eat from one resource, die after `lifespan` slices, report reactions.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHardware {
    pub period: u64,
    pub lifespan: Option<u64>,
    pub reactions: usize,
    pub tasks: Vec<usize>,
    pub eat: Option<(usize, f64)>,
    pub merit_delta: f64,
    slices: u64,
}

#[allow(dead_code)]
impl ScriptedHardware {
    pub fn idle() -> Box<dyn Hardware> {
        Box::new(Self::default())
    }

    pub fn breeder(period: u64) -> Box<dyn Hardware> {
        Box::new(Self {
            period,
            ..Self::default()
        })
    }

    pub fn mortal(lifespan: u64) -> Box<dyn Hardware> {
        Box::new(Self {
            lifespan: Some(lifespan),
            ..Self::default()
        })
    }

    pub fn reactor(reactions: usize) -> Box<dyn Hardware> {
        Box::new(Self {
            reactions,
            ..Self::default()
        })
    }

    pub fn tasker(tasks: Vec<usize>, reactions: usize) -> Box<dyn Hardware> {
        Box::new(Self {
            tasks,
            reactions,
            ..Self::default()
        })
    }

    pub fn eater(resource: usize, amount: f64) -> Box<dyn Hardware> {
        Box::new(Self {
            eat: Some((resource, amount)),
            ..Self::default()
        })
    }
}

impl Hardware for ScriptedHardware {
    fn execute(&mut self, _ctx: &ExecutionContext<'_>) -> ExecutionOutcome {
        self.slices += 1;
        let mut out = ExecutionOutcome {
            consumed_cycles: 10,
            merit_delta: self.merit_delta,
            ..ExecutionOutcome::default()
        };
        if self.period > 0 && self.slices % self.period == 0 {
            out.birth_requests
                .push(BirthRequest::clone_of(self.replicate()));
        }
        if let Some(request) = self.eat {
            out.resource_requests.push(request);
        }
        out.tasks.clone_from(&self.tasks);
        out.reactions = vec![0; self.reactions];
        out.is_dead = self.lifespan.is_some_and(|l| self.slices >= l);
        out
    }

    fn replicate(&self) -> Box<dyn Hardware> {
        Box::new(Self {
            slices: 0,
            ..self.clone()
        })
    }

    fn kind(&self) -> &str {
        "scripted"
    }
}

type PopulationMod = Box<dyn FnOnce(&mut Population)>;

#[allow(dead_code)]
pub struct PopulationBuilder {
    config: AppConfig,
    organisms: Vec<(usize, Box<dyn Hardware>, f64)>,
    mods: Vec<PopulationMod>,
}

#[allow(dead_code)]
impl PopulationBuilder {
    pub fn new(width: usize, height: usize) -> Self {
        let mut config = AppConfig::default();
        config.world.width = width;
        config.world.height = height;
        config.world.geometry = Geometry::Grid;
        config.world.seed = Some(42);
        config.world.avg_time_slice = 5;
        Self {
            config,
            organisms: Vec::new(),
            mods: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.world.seed = Some(seed);
        self
    }

    pub fn with_policy(mut self, policy: SchedulePolicy) -> Self {
        self.config.scheduler.policy = policy;
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn with_resource(mut self, def: ResourceDef) -> Self {
        self.config.resources.push(def);
        self
    }

    pub fn with_demes(mut self, num_demes: usize, trigger: ReplicationTrigger) -> Self {
        self.config.demes.num_demes = num_demes;
        self.config.demes.trigger = trigger;
        self
    }

    pub fn with_organism(mut self, cell: usize, hardware: Box<dyn Hardware>, merit: f64) -> Self {
        self.organisms.push((cell, hardware, merit));
        self
    }

    pub fn with_mod<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut Population) + 'static,
    {
        self.mods.push(Box::new(modifier));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build(self) -> Population {
        let mut pop = Population::new(self.config).expect("Failed to create population in test builder");
        for (cell, hardware, merit) in self.organisms {
            pop.inject(cell, hardware, merit)
                .expect("Failed to inject organism in test builder");
        }
        for modifier in self.mods {
            modifier(&mut pop);
        }
        pop
    }
}
