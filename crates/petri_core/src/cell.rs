//! Grid cells and their neighbourhoods.

use petri_data::{CellId, DemeId, Geometry};

/// One slot of the world grid.
#[derive(Debug, Clone)]
pub struct Cell {
    pub id: CellId,
    pub x: usize,
    pub y: usize,
    pub occupant: Option<hecs::Entity>,
    /// Resource levels last seen by the occupant.
    pub resources: Vec<f64>,
    pub visits: u64,
    /// Moore neighbourhood, restricted to the cell's own deme.
    pub neighbors: Vec<CellId>,
    pub deme: DemeId,
    /// Cell-event ids currently marking this cell.
    markers: Vec<u32>,
}

impl Cell {
    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    pub fn markers(&self) -> &[u32] {
        &self.markers
    }

    pub fn has_marker(&self, event: u32) -> bool {
        self.markers.contains(&event)
    }

    pub fn add_marker(&mut self, event: u32) {
        if !self.has_marker(event) {
            self.markers.push(event);
        }
    }

    /// Removes `event`'s marker; false if it was not present.
    pub fn remove_marker(&mut self, event: u32) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| *m != event);
        self.markers.len() != before
    }
}

/// Lays out `width` × `height` cells split into `num_demes` horizontal bands.
pub fn build_cells(width: usize, height: usize, geometry: Geometry, num_demes: usize) -> Vec<Cell> {
    let deme_height = height / num_demes.max(1);
    let wrap = geometry == Geometry::Torus;
    let deme_of = |y: usize| (y / deme_height.max(1)).min(num_demes.max(1) - 1);
    let mut cells = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let deme = deme_of(y);
            let mut neighbors = Vec::with_capacity(8);
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let Some((nx, ny)) = offset(x, y, dx, dy, width, height, wrap) else {
                        continue;
                    };
                    let id = ny * width + nx;
                    if deme_of(ny) == deme && id != y * width + x && !neighbors.contains(&id) {
                        neighbors.push(id);
                    }
                }
            }
            cells.push(Cell {
                id: y * width + x,
                x,
                y,
                occupant: None,
                resources: Vec::new(),
                visits: 0,
                neighbors,
                deme,
                markers: Vec::new(),
            });
        }
    }
    cells
}

fn offset(
    x: usize,
    y: usize,
    dx: isize,
    dy: isize,
    width: usize,
    height: usize,
    wrap: bool,
) -> Option<(usize, usize)> {
    let nx = x as isize + dx;
    let ny = y as isize + dy;
    let (w, h) = (width as isize, height as isize);
    if wrap {
        return Some((nx.rem_euclid(w) as usize, ny.rem_euclid(h) as usize));
    }
    ((0..w).contains(&nx) && (0..h).contains(&ny)).then_some((nx as usize, ny as usize))
}
