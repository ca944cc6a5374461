use crate::game_mode::{ModeKind, PlayerIndex};

/// Errors surfaced by the round lifecycle and by mode implementations.
///
/// Stale or out-of-order lifecycle calls are not errors; they are ignored.
/// These variants are for programming errors and hook failures.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundError {
    /// A mode-specific capability was used against a different mode.
    ModeMismatch { expected: ModeKind, actual: ModeKind },
    /// A player has no addon attached where one was required.
    MissingAddon {
        expected: ModeKind,
        player: PlayerIndex,
    },
    /// A mode accessor was used while no round is active.
    NoActiveMode,
    /// A mode hook reported a failure.
    Hook {
        mode: ModeKind,
        hook: &'static str,
        message: String,
    },
    Config(String),
    /// Every player index is taken.
    SeatsFull(usize),
}

impl RoundError {
    pub fn hook(mode: ModeKind, hook: &'static str, message: impl Into<String>) -> Self {
        Self::Hook {
            mode,
            hook,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModeMismatch { expected, actual } => {
                write!(f, "mode mismatch: expected {expected}, found {actual}")
            },
            Self::MissingAddon { expected, player } => {
                write!(f, "player {player} has no {expected} addon attached")
            },
            Self::NoActiveMode => write!(f, "no game mode is active"),
            Self::Hook {
                mode,
                hook,
                message,
            } => write!(f, "{mode} {hook} failed: {message}"),
            Self::Config(m) => write!(f, "invalid configuration: {m}"),
            Self::SeatsFull(n) => write!(f, "all {n} player seats are taken"),
        }
    }
}

impl std::error::Error for RoundError {}
