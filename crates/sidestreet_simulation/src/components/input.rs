//! Абстрактный input surface персонажа
//!
//! Core не знает про устройства: device binding — забота внешнего
//! коллаборатора, который заполняет этот компонент. Для headless тестов —
//! mock input, значения выставляются напрямую.

use bevy::prelude::*;

/// Input персонажа на текущий тик
///
/// Оси — continuous ([-1, 1]); `*_pressed` — дискретные edge-события,
/// живущие ровно один тик: ядро сбрасывает их в конце тика
/// (`clear_input_edges`), поэтому коллаборатор выставляет их один раз
/// на нажатие, не удерживает.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct CharacterInput {
    /// Горизонтальная ось вдоль улицы [-1, 1]
    pub horizontal: f32,
    /// Вертикальная ось [-1, 1] (используется только ladder ride)
    pub vertical: f32,
    /// Run modifier удержан
    pub run_held: bool,
    /// Edge: toggle crouch
    pub crouch_pressed: bool,
    /// Edge: прыжок
    pub jump_pressed: bool,
    /// Edge: взаимодействие (запускает context probe)
    pub interact_pressed: bool,
}

impl CharacterInput {
    /// Сброс edge-флагов (оси и run_held — состояние, их не трогаем)
    pub fn clear_edges(&mut self) {
        self.crouch_pressed = false;
        self.jump_pressed = false;
        self.interact_pressed = false;
    }
}
