//! Timed, deme-scoped cell events.

use crate::cell::Cell;
use petri_data::{CellId, Rect};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Where an event lands, in deme-relative coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EventShape {
    Rect { x1: usize, y1: usize, x2: usize, y2: usize },
    /// A `width` × `height` block placed at a random position on activation.
    Floating { width: usize, height: usize },
}

/// Configured template of a cell event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CellEventDef {
    pub shape: EventShape,
    /// Deme age at activation; `None` draws one at random.
    #[serde(default)]
    pub delay: Option<u64>,
    pub duration: u64,
    /// Kill the occupants of the target cells on activation.
    #[serde(default)]
    pub kill_on_activation: bool,
}

impl CellEventDef {
    pub fn validate(&self, width: usize, height: usize) -> anyhow::Result<()> {
        anyhow::ensure!(self.duration >= 1, "Cell event duration must be at least 1");
        match self.shape {
            EventShape::Rect { x1, y1, x2, y2 } => anyhow::ensure!(
                Rect::new(x1, y1, x2, y2).fits(width, height),
                "Cell event rectangle outside {}x{} deme",
                width,
                height
            ),
            EventShape::Floating { width: w, height: h } => anyhow::ensure!(
                w >= 1 && h >= 1 && w <= width && h <= height,
                "Floating cell event {}x{} does not fit {}x{} deme",
                w,
                h,
                width,
                height
            ),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Inactive,
    Active,
    Deactivated,
}

/// What happened to an event during one deme update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTransition {
    /// Marked `cells` (deme-relative).
    Activated { cells: Vec<CellId>, kill: bool },
    Deactivated,
}

#[derive(Debug, Clone)]
pub struct CellEvent {
    pub id: u32,
    pub def: CellEventDef,
    state: EventState,
    delay: u64,
    /// Deme-relative cells marked while active.
    targets: Vec<CellId>,
}

impl CellEvent {
    pub fn new<R: Rng>(id: u32, def: CellEventDef, max_random_delay: u64, rng: &mut R) -> Self {
        let mut event = Self {
            id,
            def,
            state: EventState::Inactive,
            delay: 0,
            targets: Vec::new(),
        };
        event.rearm(max_random_delay, rng);
        event
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn delay(&self) -> u64 {
        self.delay
    }

    pub fn targets(&self) -> &[CellId] {
        &self.targets
    }

    pub fn is_active(&self) -> bool {
        self.state == EventState::Active
    }

    /// Back to `Inactive` with a fresh delay. Markers must already be cleared.
    pub fn rearm<R: Rng>(&mut self, max_random_delay: u64, rng: &mut R) {
        self.state = EventState::Inactive;
        self.targets.clear();
        self.delay = match self.def.delay {
            Some(d) => d,
            None => rng.gen_range(0..max_random_delay.max(1)),
        };
    }

    /// Applies the transition due at deme `age` to the deme's `cells`.
    pub fn process<R: Rng>(
        &mut self,
        age: u64,
        cells: &mut [Cell],
        width: usize,
        height: usize,
        rng: &mut R,
    ) -> Option<EventTransition> {
        match self.state {
            EventState::Inactive if age == self.delay => {
                self.targets = self.place(width, height, rng);
                for &rel in &self.targets {
                    cells[rel].add_marker(self.id);
                }
                self.state = EventState::Active;
                Some(EventTransition::Activated {
                    cells: self.targets.clone(),
                    kill: self.def.kill_on_activation,
                })
            }
            EventState::Active if age == self.delay + self.def.duration => {
                self.clear_markers(cells);
                self.state = EventState::Deactivated;
                Some(EventTransition::Deactivated)
            }
            _ => None,
        }
    }

    /// Removes every marker this event placed.
    pub fn clear_markers(&mut self, cells: &mut [Cell]) {
        for &rel in &self.targets {
            cells[rel].remove_marker(self.id);
        }
    }

    fn place<R: Rng>(&self, width: usize, height: usize, rng: &mut R) -> Vec<CellId> {
        let rect = match self.def.shape {
            EventShape::Rect { x1, y1, x2, y2 } => Rect::new(x1, y1, x2, y2),
            EventShape::Floating { width: w, height: h } => {
                let x = rng.gen_range(0..=width - w);
                let y = rng.gen_range(0..=height - h);
                Rect::new(x, y, x + w - 1, y + h - 1)
            }
        };
        rect.cells(width).collect()
    }
}
