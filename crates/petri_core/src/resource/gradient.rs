//! Moving cone sources.

use petri_data::GradientDef;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const DIRECTIONS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Peak of a gradient resource and the state driving its walk.
#[derive(Debug, Clone)]
pub struct GradientState {
    pub def: GradientDef,
    pub peak_x: usize,
    pub peak_y: usize,
    direction: (isize, isize),
    updates_since_move: u64,
    rng: ChaCha8Rng,
}

impl GradientState {
    pub fn new(def: GradientDef, width: usize, height: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let peak_x = def.start_x.unwrap_or_else(|| rng.gen_range(0..width)).min(width - 1);
        let peak_y = def.start_y.unwrap_or_else(|| rng.gen_range(0..height)).min(height - 1);
        let direction = DIRECTIONS[rng.gen_range(0..DIRECTIONS.len())];
        Self {
            def,
            peak_x,
            peak_y,
            direction,
            updates_since_move: 0,
            rng,
        }
    }

    /// Advances the walk by one update and rewrites the cone into `levels`.
    pub fn step(&mut self, levels: &mut [f64], width: usize, height: usize, wrap: bool) {
        self.updates_since_move += 1;
        if self.def.move_speed > 0 && self.updates_since_move >= self.def.updates_per_move {
            self.updates_since_move = 0;
            for _ in 0..self.def.move_speed {
                self.advance(width, height, wrap);
            }
        }
        self.paint(levels, width, height, wrap);
    }

    fn advance(&mut self, width: usize, height: usize, wrap: bool) {
        let (w, h) = (width as isize, height as isize);
        let (x, y) = (self.peak_x as isize, self.peak_y as isize);
        let (mut dx, mut dy) = self.direction;
        if wrap {
            self.peak_x = (x + dx).rem_euclid(w) as usize;
            self.peak_y = (y + dy).rem_euclid(h) as usize;
            return;
        }
        if !(0..w).contains(&(x + dx)) {
            dx = -dx;
        }
        if !(0..h).contains(&(y + dy)) {
            dy = -dy;
        }
        if (dx, dy) != self.direction && self.rng.gen_bool(0.5) {
            // wobble after a bounce so the walk does not lock into a cycle
            let candidates: Vec<_> = DIRECTIONS
                .iter()
                .copied()
                .filter(|(cx, cy)| (0..w).contains(&(x + cx)) && (0..h).contains(&(y + cy)))
                .collect();
            if !candidates.is_empty() {
                (dx, dy) = candidates[self.rng.gen_range(0..candidates.len())];
            }
        }
        self.direction = (dx, dy);
        self.peak_x = (x + dx).clamp(0, w - 1) as usize;
        self.peak_y = (y + dy).clamp(0, h - 1) as usize;
    }

    fn paint(&self, levels: &mut [f64], width: usize, height: usize, wrap: bool) {
        let spread = self.def.spread;
        for y in 0..height {
            for x in 0..width {
                let dist = distance(self.peak_x, self.peak_y, x, y, width, height, wrap);
                levels[y * width + x] = if dist <= spread {
                    self.def
                        .plateau
                        .unwrap_or(self.def.height * (1.0 - dist / (spread + 1.0)))
                } else {
                    0.0
                };
            }
        }
    }
}

fn distance(ax: usize, ay: usize, bx: usize, by: usize, width: usize, height: usize, wrap: bool) -> f64 {
    let mut dx = ax.abs_diff(bx);
    let mut dy = ay.abs_diff(by);
    if wrap {
        dx = dx.min(width - dx);
        dy = dy.min(height - dy);
    }
    ((dx * dx + dy * dy) as f64).sqrt()
}
