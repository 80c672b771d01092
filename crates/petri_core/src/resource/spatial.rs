//! Per-cell resource field: sources, sinks and 4-neighbour flow.

use petri_data::{CellResourceDef, Geometry, ResourceDef};

/// Grid-backed levels of one spatial resource.
///
/// `delta` is a back buffer: flows are accumulated into it from the current
/// levels and committed in one pass, so the order cells are visited in does
/// not matter.
#[derive(Debug, Clone)]
pub struct SpatialField {
    pub(crate) levels: Vec<f64>,
    delta: Vec<f64>,
    width: usize,
    height: usize,
    wrap: bool,
}

impl SpatialField {
    pub fn new(def: &ResourceDef, width: usize, height: usize) -> Self {
        let n = width * height;
        let mut field = Self {
            levels: vec![0.0; n],
            delta: vec![0.0; n],
            width,
            height,
            wrap: def.geometry == Geometry::Torus,
        };
        field.reset(def, def.initial);
        field
    }

    /// Spreads `total` evenly over every cell, then applies per-cell initial levels.
    pub fn reset(&mut self, def: &ResourceDef, total: f64) {
        self.fill(total);
        for c in def.cells.iter().filter(|c| c.initial != 0.0) {
            self.levels[c.cell] += c.initial;
        }
    }

    pub fn fill(&mut self, total: f64) {
        let each = total / self.levels.len() as f64;
        self.levels.iter_mut().for_each(|l| *l = each);
    }

    pub fn sum(&self) -> f64 {
        self.levels.iter().sum()
    }

    pub fn level(&self, cell: usize) -> f64 {
        self.levels[cell]
    }

    pub fn add(&mut self, cell: usize, delta: f64, allow_negative: bool) {
        let next = self.levels[cell] + delta;
        self.levels[cell] = if allow_negative { next } else { next.max(0.0) };
    }

    /// Advances one whole update.
    pub fn step(&mut self, def: &ResourceDef) {
        let n = self.levels.len();
        if (def.x_diffuse > 0.0 || def.y_diffuse > 0.0 || def.x_gravity != 0.0 || def.y_gravity != 0.0) {
            self.delta.iter_mut().for_each(|d| *d = 0.0);
            self.flow_all(def);
            for i in 0..n {
                self.levels[i] += self.delta[i];
            }
        }

        let keep = 1.0 - def.decay;
        if keep < 1.0 {
            self.levels.iter_mut().for_each(|l| *l *= keep);
        }

        self.source(def);
        self.sink(def);
        self.cell_flows(&def.cells);

        if !def.allow_negative {
            self.levels.iter_mut().for_each(|l| *l = l.max(0.0));
        }
    }

    fn source(&mut self, def: &ResourceDef) {
        if def.inflow == 0.0 {
            return;
        }
        match def.inflow_region {
            Some(region) => {
                let each = def.inflow / region.area() as f64;
                for cell in region.cells(self.width) {
                    self.levels[cell] += each;
                }
            }
            None => {
                let each = def.inflow / self.levels.len() as f64;
                self.levels.iter_mut().for_each(|l| *l += each);
            }
        }
    }

    fn sink(&mut self, def: &ResourceDef) {
        if def.outflow == 0.0 {
            return;
        }
        let keep = 1.0 - def.outflow;
        match def.outflow_region {
            Some(region) => {
                for cell in region.cells(self.width) {
                    self.levels[cell] *= keep;
                }
            }
            None => self.levels.iter_mut().for_each(|l| *l *= keep),
        }
    }

    fn cell_flows(&mut self, cells: &[CellResourceDef]) {
        for c in cells {
            self.levels[c.cell] += c.inflow;
            self.levels[c.cell] *= 1.0 - c.outflow;
        }
    }

    /// Accumulates diffusion and gravity flow between every cell and its
    /// right and lower neighbours into the back buffer.
    fn flow_all(&mut self, def: &ResourceDef) {
        for y in 0..self.height {
            for x in 0..self.width {
                let here = y * self.width + x;
                if let Some(right) = self.neighbour(x, y, 1, 0) {
                    let f = flow_matter(self.levels[here], self.levels[right], def.x_diffuse, def.x_gravity);
                    self.delta[here] -= f;
                    self.delta[right] += f;
                }
                if let Some(down) = self.neighbour(x, y, 0, 1) {
                    let f = flow_matter(self.levels[here], self.levels[down], def.y_diffuse, def.y_gravity);
                    self.delta[here] -= f;
                    self.delta[down] += f;
                }
            }
        }
    }

    fn neighbour(&self, x: usize, y: usize, dx: usize, dy: usize) -> Option<usize> {
        let (nx, ny) = (x + dx, y + dy);
        if nx < self.width && ny < self.height {
            return Some(ny * self.width + nx);
        }
        if !self.wrap {
            return None;
        }
        let (nx, ny) = (nx % self.width, ny % self.height);
        if nx == x && ny == y {
            return None;
        }
        Some(ny * self.width + nx)
    }
}

/// Amount moving from `from` to its neighbour `to` in one update.
///
/// Diffusion moves `diffuse / 8` of the difference, so a cell loses at most half
/// its content to its four neighbours. Gravity moves a quarter of `|gravity|` of
/// the upstream cell's content downstream.
pub fn flow_matter(from: f64, to: f64, diffuse: f64, gravity: f64) -> f64 {
    let diffusion = diffuse * (from - to) / 8.0;
    let pull = if gravity >= 0.0 {
        from * gravity / 4.0
    } else {
        to * gravity / 4.0
    };
    diffusion + pull
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(geometry: Geometry, diffuse: f64) -> ResourceDef {
        ResourceDef::spatial("r", geometry, 0.0, diffuse)
    }

    #[test]
    fn test_flow_matter_is_antisymmetric_without_gravity() {
        let a = flow_matter(10.0, 2.0, 0.5, 0.0);
        let b = flow_matter(2.0, 10.0, 0.5, 0.0);
        assert!((a + b).abs() < 1e-12);
        assert!((a - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_gravity_moves_downstream() {
        assert!(flow_matter(4.0, 4.0, 0.0, 1.0) > 0.0);
        assert!(flow_matter(4.0, 4.0, 0.0, -1.0) < 0.0);
    }

    #[test]
    fn test_diffusion_spreads_point_source() {
        let d = def(Geometry::Grid, 1.0);
        let mut field = SpatialField::new(&d, 3, 3);
        field.levels[4] = 9.0;
        field.step(&d);
        assert!(field.level(4) < 9.0);
        assert!(field.level(1) > 0.0);
        assert!(field.level(0).abs() < 1e-12);
        assert!((field.sum() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_torus_wraps_edges() {
        let d = def(Geometry::Torus, 1.0);
        let mut field = SpatialField::new(&d, 4, 1);
        field.levels[0] = 8.0;
        field.step(&d);
        assert!(field.level(3) > 0.0);
        assert!((field.sum() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_add_clamps_at_zero() {
        let d = def(Geometry::Grid, 0.0);
        let mut field = SpatialField::new(&d, 2, 2);
        field.add(0, -3.0, false);
        assert_eq!(field.level(0), 0.0);
        field.add(0, -3.0, true);
        assert_eq!(field.level(0), -3.0);
    }
}
