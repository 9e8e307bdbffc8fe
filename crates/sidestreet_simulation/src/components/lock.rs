//! Арбитраж блокировок движения (общий контракт с combat-коллаборатором)
//!
//! Write/read контракт:
//! - combat-коллаборатор мутирует флаги (и шлёт InstantStop/StopCrouch
//!   события) в произвольный момент;
//! - locomotion читает флаги каждый тик, события применяются в начале
//!   цепочки тика (`apply_lock_commands`), до любой обработки движения.

use bevy::prelude::*;

/// Блокировки движения персонажа
///
/// Инвариант: при `can_move == false` locomotion выполняет ТОЛЬКО
/// интеграцию гравитации — никакого horizontal input, crouch/jump edges
/// не обрабатываются, сигнал скорости обнулён.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct MovementLock {
    /// Можно ли двигаться (false во время блока/атаки/хореографии у коллаборатора)
    pub can_move: bool,
    /// Подавить run modifier (forceWalk у атак)
    pub prevent_running: bool,
    /// Подавить crouch toggle (атаки запрещают приседание)
    pub prevent_crouching: bool,
}

impl Default for MovementLock {
    fn default() -> Self {
        Self {
            can_move: true,
            prevent_running: false,
            prevent_crouching: false,
        }
    }
}
