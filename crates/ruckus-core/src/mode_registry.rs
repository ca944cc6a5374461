use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{SelectionConfig, SelectionStrategy};
use crate::game_mode::{GameMode, ModeKind};

/// Source of the next mode to play. Returning `None` ends the game.
pub trait ModeFactory {
    fn next_mode(&mut self) -> Option<Box<dyn GameMode>>;
}

impl<F> ModeFactory for F
where
    F: FnMut() -> Option<Box<dyn GameMode>>,
{
    fn next_mode(&mut self) -> Option<Box<dyn GameMode>> {
        self()
    }
}

/// Constructor for a mode instance.
pub type ModeConstructor = Box<dyn Fn() -> Box<dyn GameMode>>;

/// A registered mode in the catalog.
pub struct ModeEntry {
    pub kind: ModeKind,
    pub weight: u32,
    build: ModeConstructor,
}

/// Catalog of playable modes.
#[derive(Default)]
pub struct ModeRegistry {
    entries: Vec<ModeEntry>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mode. Re-registering a kind replaces the earlier entry.
    pub fn register<F>(&mut self, kind: ModeKind, weight: u32, build: F)
    where
        F: Fn() -> Box<dyn GameMode> + 'static,
    {
        let entry = ModeEntry {
            kind,
            weight,
            build: Box::new(build),
        };
        match self.entries.iter_mut().find(|e| e.kind == kind) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn create(&self, kind: ModeKind) -> Option<Box<dyn GameMode>> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| (e.build)())
    }

    pub fn kinds(&self) -> Vec<ModeKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    /// Number of registered modes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Picks modes from a registry according to a [`SelectionConfig`].
pub struct ModeSequence {
    registry: ModeRegistry,
    selection: SelectionConfig,
    cursor: usize,
    last: Option<ModeKind>,
    rng: StdRng,
}

impl ModeSequence {
    pub fn new(registry: ModeRegistry, selection: SelectionConfig) -> Self {
        let rng = match selection.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            registry,
            selection,
            cursor: 0,
            last: None,
            rng,
        }
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.registry
    }

    fn pick_ordered(&mut self) -> Option<usize> {
        let len = self.registry.len();
        if len == 0 {
            return None;
        }
        if self.cursor >= len {
            if !self.selection.cycle {
                return None;
            }
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor += 1;
        Some(index)
    }

    fn pick_weighted(&mut self) -> Option<usize> {
        let entries = &self.registry.entries;
        let playable = entries.iter().filter(|e| e.weight > 0).count();
        let skip = if self.selection.avoid_repeat && playable > 1 {
            self.last
        } else {
            None
        };
        let eligible = |e: &ModeEntry| e.weight > 0 && Some(e.kind) != skip;

        let total: u64 = entries
            .iter()
            .filter(|e| eligible(e))
            .map(|e| u64::from(e.weight))
            .sum();
        if total == 0 {
            return None;
        }
        let mut roll = self.rng.random_range(0..total);
        for (i, entry) in entries.iter().enumerate() {
            if !eligible(entry) {
                continue;
            }
            let weight = u64::from(entry.weight);
            if roll < weight {
                return Some(i);
            }
            roll -= weight;
        }
        None
    }
}

impl ModeFactory for ModeSequence {
    fn next_mode(&mut self) -> Option<Box<dyn GameMode>> {
        let index = match self.selection.strategy {
            SelectionStrategy::Ordered => self.pick_ordered(),
            SelectionStrategy::Weighted => self.pick_weighted(),
        }?;
        let entry = &self.registry.entries[index];
        self.last = Some(entry.kind);
        tracing::debug!(mode = %entry.kind, "selected next mode");
        Some((entry.build)())
    }
}
