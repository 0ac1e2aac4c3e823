use super::scene::{EntityId, Vec2};
use crate::map::TileLayer;

/// Axis-aligned rectangle in world pixels, `x`/`y` at the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn centered(center: Vec2, width: f32, height: f32) -> Self {
        Self::new(center.x - width * 0.5, center.y - height * 0.5, width, height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Touching edges do not count as overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }
}

/// Cells blocked by any non-empty tile in the collidable layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolidGrid {
    width: u32,
    height: u32,
    tile_width: f32,
    tile_height: f32,
    solid: Vec<bool>,
}

impl SolidGrid {
    pub fn from_layers<'a>(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        layers: impl IntoIterator<Item = &'a TileLayer>,
    ) -> Self {
        let mut solid = vec![false; width as usize * height as usize];
        for layer in layers {
            for (x, y, _) in layer.occupied_cells() {
                if x < width && y < height {
                    solid[y as usize * width as usize + x as usize] = true;
                }
            }
        }
        Self {
            width,
            height,
            tile_width: tile_width.max(1) as f32,
            tile_height: tile_height.max(1) as f32,
            solid,
        }
    }

    pub fn is_solid(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.solid[y as usize * self.width as usize + x as usize]
    }

    pub fn solid_count(&self) -> usize {
        self.solid.iter().filter(|cell| **cell).count()
    }

    pub fn overlaps(&self, rect: &Rect) -> bool {
        if self.solid.is_empty() || rect.width <= 0.0 || rect.height <= 0.0 {
            return false;
        }
        let min_x = (rect.x / self.tile_width).floor().max(0.0) as u32;
        let min_y = (rect.y / self.tile_height).floor().max(0.0) as u32;
        // Exclusive far edge: a rect ending exactly on a tile boundary does not touch the next tile.
        let max_x = ((rect.right() / self.tile_width).ceil() as i64 - 1).max(-1);
        let max_y = ((rect.bottom() / self.tile_height).ceil() as i64 - 1).max(-1);
        if max_x < 0 || max_y < 0 {
            return false;
        }
        let max_x = (max_x as u32).min(self.width.saturating_sub(1));
        let max_y = (max_y as u32).min(self.height.saturating_sub(1));
        (min_y..=max_y).any(|y| (min_x..=max_x).any(|x| self.is_solid(x, y)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticBody {
    pub owner: EntityId,
    pub rect: Rect,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionWorld {
    grid: SolidGrid,
    bodies: Vec<StaticBody>,
    bounds: Option<Rect>,
}

impl CollisionWorld {
    pub fn set_grid(&mut self, grid: SolidGrid) {
        self.grid = grid;
    }

    pub fn grid(&self) -> &SolidGrid {
        &self.grid
    }

    pub fn set_bounds(&mut self, bounds: Option<Rect>) {
        self.bounds = bounds;
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn add_body(&mut self, owner: EntityId, rect: Rect) {
        self.bodies.push(StaticBody { owner, rect });
    }

    pub fn remove_bodies_of(&mut self, owner: EntityId) -> usize {
        let before = self.bodies.len();
        self.bodies.retain(|body| body.owner != owner);
        before - self.bodies.len()
    }

    pub fn bodies(&self) -> &[StaticBody] {
        &self.bodies
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn blocked(&self, rect: &Rect) -> bool {
        self.grid.overlaps(rect) || self.bodies.iter().any(|body| body.rect.overlaps(rect))
    }

    /// Moves `body` by `delta`, x axis first then y, so sliding along a wall
    /// keeps the free axis. Returns the applied displacement.
    pub fn move_body(&self, body: Rect, delta: Vec2) -> Vec2 {
        let moved_x = self.sweep_axis(body, delta.x, true);
        let after_x = body.translated(moved_x, 0.0);
        let moved_y = self.sweep_axis(after_x, delta.y, false);
        let mut applied = Vec2::new(moved_x, moved_y);

        if let Some(bounds) = self.bounds {
            let mut end = body.translated(applied.x, applied.y);
            if end.width <= bounds.width {
                end.x = end.x.clamp(bounds.x, bounds.right() - end.width);
            }
            if end.height <= bounds.height {
                end.y = end.y.clamp(bounds.y, bounds.bottom() - end.height);
            }
            applied = Vec2::new(end.x - body.x, end.y - body.y);
        }
        applied
    }

    fn sweep_axis(&self, body: Rect, distance: f32, horizontal: bool) -> f32 {
        if distance == 0.0 || !distance.is_finite() {
            return 0.0;
        }
        let steps = distance.abs().ceil().max(1.0) as u32;
        let step = distance / steps as f32;
        let mut travelled = 0.0;
        for _ in 0..steps {
            let next = travelled + step;
            let candidate = if horizontal {
                body.translated(next, 0.0)
            } else {
                body.translated(0.0, next)
            };
            if self.blocked(&candidate) {
                break;
            }
            travelled = next;
        }
        travelled
    }
}
