use serde::{Deserialize, Serialize};

/// Spatial layout of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Geometry {
    /// A single well-mixed scalar shared by every cell.
    #[default]
    Global,
    /// Per-cell levels with closed edges.
    Grid,
    /// Per-cell levels with wrap-around edges.
    Torus,
    /// A single scalar like `Global`, visible only from the listed cells.
    Partial,
}

impl Geometry {
    pub fn is_spatial(self) -> bool {
        matches!(self, Geometry::Grid | Geometry::Torus)
    }
}

/// Inclusive rectangle in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: usize,
    pub y1: usize,
    pub x2: usize,
    pub y2: usize,
}

impl Rect {
    pub fn new(x1: usize, y1: usize, x2: usize, y2: usize) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    pub fn area(&self) -> usize {
        (self.x2 - self.x1 + 1) * (self.y2 - self.y1 + 1)
    }

    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.x2 < width && self.y2 < height
    }

    /// Iterates the cell ids covered by this rectangle on a grid of `width` columns.
    pub fn cells(&self, width: usize) -> impl Iterator<Item = usize> + '_ {
        (self.y1..=self.y2).flat_map(move |y| (self.x1..=self.x2).map(move |x| y * width + x))
    }
}

/// Per-cell overrides for a spatial resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellResourceDef {
    pub cell: usize,
    #[serde(default)]
    pub initial: f64,
    #[serde(default)]
    pub inflow: f64,
    /// Fraction of the cell's level removed each update.
    #[serde(default)]
    pub outflow: f64,
}

/// Moving cone ("peak") parameters for gradient resources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientDef {
    /// Level at the peak centre.
    pub height: f64,
    /// Radius of the cone in cells.
    pub spread: f64,
    /// Cells moved per move step (0 = stationary).
    #[serde(default)]
    pub move_speed: usize,
    /// Updates between move steps.
    #[serde(default = "default_updates_per_move")]
    pub updates_per_move: u64,
    /// If set, every cell inside the cone holds this flat value instead of a slope.
    #[serde(default)]
    pub plateau: Option<f64>,
    #[serde(default)]
    pub start_x: Option<usize>,
    #[serde(default)]
    pub start_y: Option<usize>,
}

fn default_updates_per_move() -> u64 {
    1
}

/// Read-only definition of one resource, as supplied by the environment tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub name: String,
    #[serde(default)]
    pub initial: f64,
    /// Amount added per update (spread across the inflow region for spatial resources).
    #[serde(default)]
    pub inflow: f64,
    /// Fraction removed per update from the outflow region.
    #[serde(default)]
    pub outflow: f64,
    /// Fraction lost per update; the per-update multiplier is `1 - decay`.
    #[serde(default)]
    pub decay: f64,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub x_diffuse: f64,
    #[serde(default)]
    pub y_diffuse: f64,
    #[serde(default)]
    pub x_gravity: f64,
    #[serde(default)]
    pub y_gravity: f64,
    #[serde(default)]
    pub inflow_region: Option<Rect>,
    #[serde(default)]
    pub outflow_region: Option<Rect>,
    #[serde(default)]
    pub cells: Vec<CellResourceDef>,
    #[serde(default)]
    pub gradient: Option<GradientDef>,
    #[serde(default)]
    pub allow_negative: bool,
}

impl ResourceDef {
    /// A global resource with the given inflow and no decay.
    pub fn global(name: impl Into<String>, initial: f64, inflow: f64) -> Self {
        Self {
            name: name.into(),
            initial,
            inflow,
            outflow: 0.0,
            decay: 0.0,
            geometry: Geometry::Global,
            x_diffuse: 0.0,
            y_diffuse: 0.0,
            x_gravity: 0.0,
            y_gravity: 0.0,
            inflow_region: None,
            outflow_region: None,
            cells: Vec::new(),
            gradient: None,
            allow_negative: false,
        }
    }

    /// A spatial resource with uniform diffusion and nothing else.
    pub fn spatial(name: impl Into<String>, geometry: Geometry, initial: f64, diffuse: f64) -> Self {
        Self {
            geometry,
            x_diffuse: diffuse,
            y_diffuse: diffuse,
            ..Self::global(name, initial, 0.0)
        }
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_inflow(mut self, inflow: f64, region: Option<Rect>) -> Self {
        self.inflow = inflow;
        self.inflow_region = region;
        self
    }

    pub fn with_outflow(mut self, outflow: f64, region: Option<Rect>) -> Self {
        self.outflow = outflow;
        self.outflow_region = region;
        self
    }

    pub fn with_gravity(mut self, x: f64, y: f64) -> Self {
        self.x_gravity = x;
        self.y_gravity = y;
        self
    }

    pub fn with_gradient(mut self, gradient: GradientDef) -> Self {
        self.gradient = Some(gradient);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::new(4, 3, 1, 0);
        assert_eq!((r.x1, r.y1, r.x2, r.y2), (1, 0, 4, 3));
        assert_eq!(r.area(), 16);
    }

    #[test]
    fn test_rect_cells() {
        let r = Rect::new(1, 1, 2, 2);
        let cells: Vec<_> = r.cells(5).collect();
        assert_eq!(cells, vec![6, 7, 11, 12]);
    }

    #[test]
    fn test_geometry_deserializes_kebab_case() {
        let g: Geometry = serde_json::from_str("\"torus\"").unwrap();
        assert_eq!(g, Geometry::Torus);
        assert!(g.is_spatial());
        assert!(!Geometry::Global.is_spatial());
        assert!(!Geometry::Partial.is_spatial());
    }
}
