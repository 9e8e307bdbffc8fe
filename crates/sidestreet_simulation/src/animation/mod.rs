//! Cue-события для animation-коллаборатора
//!
//! Ядро не знает имён анимаций: наружу уходят только opaque идентификаторы,
//! которые animation-коллаборатор резолвит сам (никаких magic strings).
//! Непрерывные сигналы (grounded, crouching, LocomotionSpeed) — компоненты.

use bevy::prelude::*;

/// Дискретные идентификаторы анимационных событий
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, serde::Serialize, serde::Deserialize)]
pub enum CueId {
    Jump,
    WallClimbHigh,
    WallClimbMid,
    WallClimbLow,
    LadderBottomEntry,
    LadderTopEntry,
    LadderTopExit,
}

/// Событие: cue для animation-коллаборатора
///
/// Генерируется в определённых точках state machine (прыжок, старт каждой
/// хореографии). Ядро событие не читает.
#[derive(Event, Debug, Clone)]
pub struct AnimationCue {
    pub entity: Entity,
    pub cue: CueId,
}
