//! Mode-specific per-player extension state.
//!
//! A player carries at most one addon, owned by whichever mode attached it.
//! Access goes through typed accessors that check the addon's mode kind and
//! fail with [`RoundError::ModeMismatch`] instead of handing back the wrong
//! type.

use std::any::Any;
use std::fmt;

use crate::error::RoundError;
use crate::game_mode::ModeKind;

/// Object-safe view of an addon.
pub trait Addon: fmt::Debug + Any {
    fn kind(&self) -> ModeKind;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implemented by concrete addon types; [`Addon`] follows automatically.
pub trait AddonVariant: fmt::Debug + Any {
    const KIND: ModeKind;
}

impl<A: AddonVariant> Addon for A {
    fn kind(&self) -> ModeKind {
        A::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Borrow `addon` as `A`, or report which mode it actually belongs to.
pub fn downcast_ref<A: AddonVariant>(addon: &dyn Addon) -> Result<&A, RoundError> {
    let actual = addon.kind();
    addon
        .as_any()
        .downcast_ref::<A>()
        .ok_or(RoundError::ModeMismatch {
            expected: A::KIND,
            actual,
        })
}

pub fn downcast_mut<A: AddonVariant>(addon: &mut dyn Addon) -> Result<&mut A, RoundError> {
    let actual = addon.kind();
    addon
        .as_any_mut()
        .downcast_mut::<A>()
        .ok_or(RoundError::ModeMismatch {
            expected: A::KIND,
            actual,
        })
}
