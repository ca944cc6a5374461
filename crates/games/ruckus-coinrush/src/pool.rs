use serde::{Deserialize, Serialize};

/// A collectible coin in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub x: f32,
    pub z: f32,
    pub value: u32,
}

/// Fixed-capacity coin pool. Released slots are reused by later spawns.
#[derive(Debug, Default)]
pub struct CoinPool {
    slots: Vec<Option<Coin>>,
    free: Vec<usize>,
}

impl CoinPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `capacity` empty slots, dropping any live coins.
    pub fn prewarm(&mut self, capacity: usize) {
        self.slots = vec![None; capacity];
        self.free = (0..capacity).rev().collect();
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Place a coin. Returns `None` when the pool is full.
    pub fn acquire(&mut self, coin: Coin) -> Option<usize> {
        let index = self.free.pop()?;
        self.slots[index] = Some(coin);
        Some(index)
    }

    pub fn release(&mut self, index: usize) -> Option<Coin> {
        let coin = self.slots.get_mut(index)?.take()?;
        self.free.push(index);
        Some(coin)
    }

    /// Release every live coin. Returns how many were live.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for index in 0..self.slots.len() {
            if self.release(index).is_some() {
                released += 1;
            }
        }
        released
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Indices of live coins.
    pub fn live(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|_| i))
            .collect()
    }

    pub fn get(&self, index: usize) -> Option<&Coin> {
        self.slots.get(index)?.as_ref()
    }
}
