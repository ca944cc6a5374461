pub mod addon;
pub mod config;
pub mod countdown;
pub mod error;
pub mod events;
pub mod game_mode;
pub mod mode_registry;
pub mod player;
pub mod round;
pub mod scheduler;
pub mod score;
pub mod session;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use crate::addon::AddonVariant;
    use crate::config::SessionConfig;
    use crate::error::RoundError;
    use crate::events::SessionEvent;
    use crate::game_mode::{
        GameMode, ModeContext, ModeKind, ModeMetadata, ModeVariant, PlayerIndex, ScoreDeltas,
    };
    use crate::player::PlayerRegistry;
    use crate::session::Session;
    use crate::time::Channel;

    pub const SCRIPTED: ModeKind = ModeKind("scripted");

    /// Shared record of which hooks a [`ScriptedMode`] has seen.
    #[derive(Debug, Clone, Default)]
    pub struct HookLog(Rc<RefCell<Vec<&'static str>>>);

    impl HookLog {
        pub fn push(&self, hook: &'static str) {
            self.0.borrow_mut().push(hook);
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.0.borrow().clone()
        }
    }

    /// What a [`ScriptedMode`] does when its timer runs out.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum TimeOverBehavior {
        EndNow,
        EndAfter(f32),
        /// Never ends the round on its own.
        Hold,
    }

    #[derive(Debug, Default)]
    pub struct ScriptedAddon {
        pub touched: u32,
    }

    impl AddonVariant for ScriptedAddon {
        const KIND: ModeKind = SCRIPTED;
    }

    /// Configurable test double for the [`GameMode`] contract.
    pub struct ScriptedMode {
        kind: ModeKind,
        log: HookLog,
        duration: f32,
        deltas: ScoreDeltas,
        time_over: TimeOverBehavior,
        leak_addons: bool,
        fail_init_arena: bool,
    }

    impl ScriptedMode {
        pub fn new(kind: ModeKind) -> Self {
            Self {
                kind,
                log: HookLog::default(),
                duration: 10.0,
                deltas: ScoreDeltas::new(),
                time_over: TimeOverBehavior::EndNow,
                leak_addons: false,
                fail_init_arena: false,
            }
        }

        pub fn with_log(mut self, log: HookLog) -> Self {
            self.log = log;
            self
        }

        pub fn with_duration(mut self, secs: f32) -> Self {
            self.duration = secs;
            self
        }

        pub fn with_deltas(mut self, deltas: impl IntoIterator<Item = (PlayerIndex, i32)>) -> Self {
            self.deltas = deltas.into_iter().collect();
            self
        }

        pub fn with_time_over(mut self, behavior: TimeOverBehavior) -> Self {
            self.time_over = behavior;
            self
        }

        /// Skip detaching addons in `clear_round`.
        pub fn leaking_addons(mut self) -> Self {
            self.leak_addons = true;
            self
        }

        pub fn failing_init_arena(mut self) -> Self {
            self.fail_init_arena = true;
            self
        }
    }

    impl GameMode for ScriptedMode {
        fn kind(&self) -> ModeKind {
            self.kind
        }

        fn metadata(&self) -> ModeMetadata {
            ModeMetadata {
                kind: self.kind,
                name: "Scripted".to_string(),
                description: "Test double".to_string(),
                min_players: 1,
                round_duration: Duration::try_from_secs_f32(self.duration).unwrap_or_default(),
            }
        }

        fn init_arena(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
            self.log.push("init_arena");
            if self.fail_init_arena {
                return Err(RoundError::hook(self.kind, "init_arena", "scripted failure"));
            }
            ctx.players.attach_all(|_| ScriptedAddon::default());
            Ok(())
        }

        fn init_round(&mut self, _ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
            self.log.push("init_round");
            Ok(())
        }

        fn on_time_over(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
            self.log.push("on_time_over");
            match self.time_over {
                TimeOverBehavior::EndNow => {
                    ctx.end_round_after(0.0);
                },
                TimeOverBehavior::EndAfter(delay) => {
                    ctx.end_round_after(delay);
                },
                TimeOverBehavior::Hold => {},
            }
            Ok(())
        }

        fn end_round(&mut self, _ctx: &mut ModeContext<'_>) -> Result<ScoreDeltas, RoundError> {
            self.log.push("end_round");
            Ok(self.deltas.clone())
        }

        fn clear_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
            self.log.push("clear_round");
            if !self.leak_addons {
                ctx.players.detach_kind(SCRIPTED);
            }
            Ok(())
        }
    }

    impl ModeVariant for ScriptedMode {
        const KIND: ModeKind = SCRIPTED;
    }

    /// Create `n` seated players named `Player1..=PlayerN`.
    pub fn make_players(n: usize) -> PlayerRegistry {
        PlayerRegistry::from_names((0..n).map(|i| format!("Player{}", i + 1)))
    }

    /// Factory yielding `count` default scripted modes, then nothing.
    pub fn scripted_factory(count: usize) -> impl FnMut() -> Option<Box<dyn GameMode>> {
        let mut remaining = count;
        move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            Some(Box::new(ScriptedMode::new(SCRIPTED)) as Box<dyn GameMode>)
        }
    }

    /// Session with default pacing, `total_rounds` rounds, and an endless
    /// supply of scripted modes.
    pub fn session_with(total_rounds: u32, players: usize) -> Session {
        let config = SessionConfig {
            total_rounds,
            ..SessionConfig::default()
        };
        Session::new(&config, make_players(players), scripted_factory(usize::MAX))
    }

    /// Tick both channels in lockstep for `seconds`, `dt` at a time.
    pub fn advance(session: &mut Session, seconds: f32, dt: f32) {
        let steps = (seconds / dt).round().max(1.0) as usize;
        for _ in 0..steps {
            session.tick(Channel::Fixed, dt);
            session.tick(Channel::Variable, dt);
        }
    }

    // ================================================================
    // GameMode Contract Tests
    // ================================================================
    // Every GameMode implementation should pass these. Mode crates call
    // them from their own #[cfg(test)] modules with a concrete instance.

    /// Play `mode` as the only round of a session and return the events.
    /// Panics if the round does not finish within `max_secs` of play.
    pub fn play_single_round(
        mode: Box<dyn GameMode>,
        player_count: usize,
        max_secs: f32,
    ) -> (Session, Vec<SessionEvent>) {
        let config = SessionConfig {
            total_rounds: 1,
            lead_time_secs: 0.5,
            score_display_secs: 0.5,
            ..SessionConfig::default()
        };
        let mut slot = Some(mode);
        let mut session = Session::new(&config, make_players(player_count), move || slot.take());
        session.next_round().expect("next_round must succeed");

        let dt = 1.0 / 60.0;
        let mut events = Vec::new();
        let mut elapsed = 0.0;
        while !session.is_finished() && elapsed < max_secs {
            advance(&mut session, dt, dt);
            events.extend(session.drain_events());
            elapsed += dt;
        }
        assert!(
            session.is_finished(),
            "mode must finish its round within {max_secs}s"
        );
        (session, events)
    }

    /// After the round is cleared the mode must leave nothing scheduled.
    pub fn contract_clear_cancels_scheduled_work(mode: Box<dyn GameMode>, player_count: usize) {
        let (session, _) = play_single_round(mode, player_count, 600.0);
        for channel in Channel::ALL {
            assert_eq!(
                session.pending_actions(channel),
                0,
                "clear_round must cancel every action the mode scheduled on the {channel} channel"
            );
        }
    }

    /// After the round is cleared no player may still carry the mode's addon.
    pub fn contract_clear_detaches_addons(mode: Box<dyn GameMode>, player_count: usize) {
        let (session, _) = play_single_round(mode, player_count, 600.0);
        for p in session.players().iter() {
            assert!(
                p.addon_kind().is_none(),
                "player {} still carries an addon after clear_round",
                p.index
            );
        }
    }

    /// Addons attached in `init_arena` must belong to the mode that attached them.
    pub fn contract_addons_match_mode(mode: Box<dyn GameMode>, player_count: usize) {
        let kind = mode.kind();
        let mut slot = Some(mode);
        let mut session = Session::new(
            &SessionConfig::default(),
            make_players(player_count),
            move || slot.take(),
        );
        session.next_round().expect("next_round must succeed");
        for p in session.players().iter() {
            if let Some(addon_kind) = p.addon_kind() {
                assert_eq!(addon_kind, kind, "addon kind must match mode kind");
            }
        }
    }

    /// Score deltas may only name seated players.
    pub fn contract_scores_name_seated_players(mode: Box<dyn GameMode>, player_count: usize) {
        let (session, events) = play_single_round(mode, player_count, 600.0);
        let seated = session.players().indices();
        let scored = events.iter().find_map(|e| match e {
            SessionEvent::RoundScored { deltas, .. } => Some(deltas.clone()),
            _ => None,
        });
        let deltas = scored.expect("round must be scored");
        for player in deltas.keys() {
            assert!(seated.contains(player), "delta for unknown player {player}");
        }
    }
}
