use crate::addon::{self, Addon, AddonVariant};
use crate::error::RoundError;
use crate::game_mode::{ModeKind, PlayerIndex};

/// A local player seated at the shared screen.
#[derive(Debug)]
pub struct Player {
    pub index: PlayerIndex,
    pub display_name: String,
    /// Frozen players ignore input (lead-in countdown, between rounds).
    pub frozen: bool,
    addon: Option<Box<dyn Addon>>,
}

impl Player {
    pub fn new(index: PlayerIndex, display_name: impl Into<String>) -> Self {
        Self {
            index,
            display_name: display_name.into(),
            frozen: true,
            addon: None,
        }
    }

    /// Attach a mode addon, replacing any previous one.
    pub fn attach_addon<A: AddonVariant>(&mut self, addon: A) {
        if let Some(old) = &self.addon {
            tracing::warn!(
                player = self.index,
                old = %old.kind(),
                new = %A::KIND,
                "replacing addon left by another mode"
            );
        }
        self.addon = Some(Box::new(addon));
    }

    pub fn detach_addon(&mut self) -> Option<Box<dyn Addon>> {
        self.addon.take()
    }

    pub fn addon_kind(&self) -> Option<ModeKind> {
        self.addon.as_ref().map(|a| a.kind())
    }

    /// Typed access to this player's addon.
    pub fn addon<A: AddonVariant>(&self) -> Result<&A, RoundError> {
        let boxed = self.addon.as_deref().ok_or(RoundError::MissingAddon {
            expected: A::KIND,
            player: self.index,
        })?;
        addon::downcast_ref::<A>(boxed)
    }

    pub fn addon_mut<A: AddonVariant>(&mut self) -> Result<&mut A, RoundError> {
        let index = self.index;
        let boxed = self.addon.as_deref_mut().ok_or(RoundError::MissingAddon {
            expected: A::KIND,
            player: index,
        })?;
        addon::downcast_mut::<A>(boxed)
    }
}

/// Seated players, indexed by seat.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one player per name, seated in order.
    ///
    /// Names beyond the last seat index are dropped with a warning.
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let mut registry = Self::new();
        for name in names {
            if let Err(e) = registry.add(name) {
                tracing::warn!(error = %e, "not seating remaining players");
                break;
            }
        }
        registry
    }

    /// Seat a player at the next free index.
    pub fn add(&mut self, display_name: impl Into<String>) -> Result<PlayerIndex, RoundError> {
        let index = PlayerIndex::try_from(self.players.len())
            .map_err(|_| RoundError::SeatsFull(self.players.len()))?;
        self.players.push(Player::new(index, display_name));
        Ok(index)
    }

    /// Display name of `index`, or an empty string for an unknown seat.
    pub fn name(&self, index: PlayerIndex) -> &str {
        self.get(index).map_or("", |p| p.display_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, index: PlayerIndex) -> Option<&Player> {
        self.players.get(index as usize)
    }

    pub fn get_mut(&mut self, index: PlayerIndex) -> Option<&mut Player> {
        self.players.get_mut(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn indices(&self) -> Vec<PlayerIndex> {
        self.players.iter().map(|p| p.index).collect()
    }

    /// Indices of players currently accepting input.
    pub fn active(&self) -> Vec<PlayerIndex> {
        self.players
            .iter()
            .filter(|p| !p.frozen)
            .map(|p| p.index)
            .collect()
    }

    pub fn freeze_all(&mut self) {
        for p in &mut self.players {
            p.frozen = true;
        }
    }

    pub fn unfreeze_all(&mut self) {
        for p in &mut self.players {
            p.frozen = false;
        }
    }

    /// Give every player a fresh addon built by `make`.
    pub fn attach_all<A: AddonVariant>(&mut self, mut make: impl FnMut(PlayerIndex) -> A) {
        for p in &mut self.players {
            let addon = make(p.index);
            p.attach_addon(addon);
        }
    }

    /// Remove every addon belonging to `kind`. Returns how many were removed.
    pub fn detach_kind(&mut self, kind: ModeKind) -> usize {
        let mut removed = 0;
        for p in &mut self.players {
            if p.addon_kind() == Some(kind) {
                p.detach_addon();
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Tag {
        hits: u32,
    }

    impl AddonVariant for Tag {
        const KIND: ModeKind = ModeKind("tag");
    }

    #[derive(Debug, Default)]
    struct Race;

    impl AddonVariant for Race {
        const KIND: ModeKind = ModeKind("race");
    }

    #[test]
    fn players_start_frozen_in_seat_order() {
        let registry = PlayerRegistry::from_names(["Ana", "Bo", "Cy", "Di", "Ed"]);
        assert_eq!(registry.len(), 5);
        assert!(registry.active().is_empty());
        assert_eq!(registry.name(4), "Ed");
        assert_eq!(registry.name(9), "");
    }

    #[test]
    fn seats_stop_at_the_last_index() {
        let mut registry = PlayerRegistry::from_names((0..300).map(|i| format!("P{i}")));
        assert_eq!(registry.len(), 256);
        assert_eq!(registry.get(255).map(|p| p.index), Some(255));
        assert_eq!(registry.add("Late"), Err(RoundError::SeatsFull(256)));
        assert_eq!(registry.len(), 256);
    }

    #[test]
    fn freeze_and_unfreeze() {
        let mut registry = PlayerRegistry::from_names(["Ana", "Bo"]);
        registry.unfreeze_all();
        assert_eq!(registry.active(), vec![0, 1]);
        registry.freeze_all();
        assert!(registry.active().is_empty());
    }

    #[test]
    fn typed_addon_access() {
        let mut registry = PlayerRegistry::from_names(["Ana"]);
        registry.attach_all(|_| Tag::default());

        let player = registry.get_mut(0).unwrap();
        player.addon_mut::<Tag>().unwrap().hits += 2;
        assert_eq!(player.addon::<Tag>().unwrap().hits, 2);
    }

    #[test]
    fn addon_of_other_mode_is_rejected() {
        let mut registry = PlayerRegistry::from_names(["Ana"]);
        registry.attach_all(|_| Race);

        let err = registry.get(0).unwrap().addon::<Tag>().unwrap_err();
        assert_eq!(
            err,
            RoundError::ModeMismatch {
                expected: ModeKind("tag"),
                actual: ModeKind("race"),
            }
        );
    }

    #[test]
    fn missing_addon_is_reported() {
        let registry = PlayerRegistry::from_names(["Ana"]);
        let err = registry.get(0).unwrap().addon::<Tag>().unwrap_err();
        assert_eq!(
            err,
            RoundError::MissingAddon {
                expected: ModeKind("tag"),
                player: 0,
            }
        );
    }

    #[test]
    fn detach_kind_only_removes_matching() {
        let mut registry = PlayerRegistry::from_names(["Ana", "Bo"]);
        registry.attach_all(|_| Tag::default());
        registry.get_mut(1).unwrap().attach_addon(Race);

        assert_eq!(registry.detach_kind(ModeKind("tag")), 1);
        assert_eq!(registry.get(0).unwrap().addon_kind(), None);
        assert_eq!(registry.get(1).unwrap().addon_kind(), Some(ModeKind("race")));
    }
}
