//! Simulated warehouse floor backing the coordination core.
//!
//! [`GridWorld`] is a rectangular open floor with straight-line motion and
//! shelf positions laid out in rows; [`SimInventory`] is a plain stock ledger
//! that reports threshold crossings. Both are deterministic for a given seed
//! so simulation runs are reproducible.

use std::collections::HashMap;

use fleetor_core::{AgentId, Point, ShelfId};
use fleetor_dispatch::{Inventory, Navigation};

/// xorshift64 generator, good enough for roam sampling and order synthesis.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Seeds the generator; a zero seed is remapped to a fixed constant.
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed },
        }
    }

    /// Next raw value.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform value in `[0, bound)`; `bound` must be nonzero.
    pub fn next_below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Open rectangular floor with point shelves and straight-line motion.
pub struct GridWorld {
    width: f32,
    height: f32,
    speed: f32,
    shelves: HashMap<ShelfId, Point>,
    positions: HashMap<AgentId, Point>,
    targets: HashMap<AgentId, Point>,
    rng: Rng,
}

impl GridWorld {
    /// Builds a floor of the given size with `shelf_count` shelves laid out
    /// in rows along the upper half.
    pub fn new(width: f32, height: f32, shelf_count: u32, speed: f32, seed: u64) -> Self {
        let mut shelves = HashMap::new();
        let per_row = ((width / 4.0).floor().max(1.0)) as u32;
        for shelf in 0..shelf_count {
            let col = shelf % per_row;
            let row = shelf / per_row;
            shelves.insert(
                shelf,
                Point::new(
                    2.0 + (col as f32) * 4.0,
                    height / 2.0 + (row as f32) * 3.0,
                ),
            );
        }
        Self {
            width,
            height,
            speed,
            shelves,
            positions: HashMap::new(),
            targets: HashMap::new(),
            rng: Rng::new(seed),
        }
    }

    /// Places an agent on the floor, clamped to bounds.
    pub fn spawn_agent(&mut self, agent: AgentId, point: Point) {
        self.positions.insert(agent, self.clamp(point));
    }

    /// Shelf handles known to this floor, unordered.
    pub fn shelf_ids(&self) -> Vec<ShelfId> {
        self.shelves.keys().copied().collect()
    }

    /// Advances every agent toward its target by `delta` seconds of travel.
    pub fn step(&mut self, delta: f64) {
        let budget = self.speed * delta as f32;
        for (&agent, position) in self.positions.iter_mut() {
            let Some(&target) = self.targets.get(&agent) else {
                continue;
            };
            let remaining = position.distance(target);
            if remaining <= budget {
                *position = target;
            } else if remaining > 0.0 {
                let frac = budget / remaining;
                position.x += (target.x - position.x) * frac;
                position.y += (target.y - position.y) * frac;
            }
        }
    }

    /// Whether the agent has reached its current target.
    pub fn arrived(&self, agent: AgentId) -> bool {
        match (self.positions.get(&agent), self.targets.get(&agent)) {
            (Some(position), Some(target)) => position.distance(*target) < 0.01,
            _ => false,
        }
    }

    fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(0.0, self.width),
            point.y.clamp(0.0, self.height),
        )
    }

    fn in_bounds(&self, point: Point) -> bool {
        point.x >= 0.0 && point.x <= self.width && point.y >= 0.0 && point.y <= self.height
    }
}

impl Navigation for GridWorld {
    fn has_feasible_path(&self, from: Point, to: Point) -> bool {
        self.in_bounds(from) && self.in_bounds(to)
    }

    fn set_destination(&mut self, agent: AgentId, point: Point) -> bool {
        if !self.positions.contains_key(&agent) || !self.in_bounds(point) {
            return false;
        }
        self.targets.insert(agent, point);
        true
    }

    fn remaining_distance(&self, agent: AgentId) -> f32 {
        match (self.positions.get(&agent), self.targets.get(&agent)) {
            (Some(position), Some(target)) => position.distance(*target),
            _ => 0.0,
        }
    }

    fn current_position(&self, agent: AgentId) -> Point {
        self.positions.get(&agent).copied().unwrap_or_default()
    }

    fn retreat_point(&self, agent: AgentId, distance: f32) -> Option<Point> {
        let position = *self.positions.get(&agent)?;
        // Back away from the current target; with no target, fall back to
        // moving toward the floor center.
        let reference = self
            .targets
            .get(&agent)
            .copied()
            .unwrap_or_else(|| Point::new(self.width / 2.0, self.height / 2.0));
        let away_x = position.x - reference.x;
        let away_y = position.y - reference.y;
        let norm = (away_x * away_x + away_y * away_y).sqrt();
        if norm < f32::EPSILON {
            return Some(self.clamp(Point::new(position.x - distance, position.y)));
        }
        Some(self.clamp(Point::new(
            position.x + away_x / norm * distance,
            position.y + away_y / norm * distance,
        )))
    }

    fn sample_roam_point(&mut self) -> Option<Point> {
        let x = self.rng.next_f32() * self.width;
        // Roam destinations stay in the lower half, away from the shelf rows.
        let y = self.rng.next_f32() * (self.height / 2.0);
        Some(Point::new(x, y))
    }

    fn fallback_point(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 4.0)
    }

    fn shelf_location(&self, shelf: ShelfId) -> Option<Point> {
        self.shelves.get(&shelf).copied()
    }
}

/// Stock ledger that records threshold crossings for the coordinator to
/// drain.
pub struct SimInventory {
    stock: HashMap<ShelfId, u32>,
    threshold: u32,
    low_stock: Vec<ShelfId>,
}

impl SimInventory {
    /// Creates a ledger with every listed shelf at `initial_stock`.
    pub fn new(shelves: &[ShelfId], initial_stock: u32, threshold: u32) -> Self {
        Self {
            stock: shelves.iter().map(|&shelf| (shelf, initial_stock)).collect(),
            threshold,
            low_stock: Vec::new(),
        }
    }
}

impl Inventory for SimInventory {
    fn current_stock(&self, shelf: ShelfId) -> Option<u32> {
        self.stock.get(&shelf).copied()
    }

    fn is_low_stock(&self, shelf: ShelfId) -> bool {
        self.stock
            .get(&shelf)
            .is_some_and(|&level| level <= self.threshold)
    }

    fn remove_stock(&mut self, shelf: ShelfId, quantity: u32) -> u32 {
        let Some(level) = self.stock.get_mut(&shelf) else {
            return 0;
        };
        let before = *level;
        *level = level.saturating_sub(quantity);
        if before > self.threshold && *level <= self.threshold {
            self.low_stock.push(shelf);
        }
        *level
    }

    fn add_stock(&mut self, shelf: ShelfId, quantity: u32) -> u32 {
        let level = self.stock.entry(shelf).or_insert(0);
        *level += quantity;
        *level
    }

    fn drain_low_stock(&mut self) -> Vec<ShelfId> {
        std::mem::take(&mut self.low_stock)
    }
}
