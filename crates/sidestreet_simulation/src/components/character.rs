//! Базовые компоненты персонажа: motor, опорный объём, street-angle, authority

use bevy::prelude::*;

/// Marker component для персонажа под контролем игрока
///
/// Все системы ядра фильтруют по `With<Player>`; геометрия окружения
/// (probe volumes) обязана быть `Without<Player>` — это разводит
/// mutable/immutable доступ к Transform в одной системе.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Player;

/// Кинематическое состояние персонажа
///
/// Velocity интегрируем сами (Rapier описывает тело, но не двигает его).
/// Горизонтальная скорость хранится отдельно от вертикальной: в воздухе
/// горизонтальный momentum сохраняется, пока locomotion не перезапишет его
/// на земле.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct CharacterMotor {
    /// Горизонтальная скорость (m/s, мировые XZ, Y всегда 0)
    pub horizontal_velocity: Vec3,
    /// Вертикальная скорость (m/s, скаляр)
    pub vertical_velocity: f32,
    /// На земле ли персонаж (downward probe против опорного объёма)
    pub grounded: bool,
    /// Согнут ли персонаж (toggle, меняет опорный объём)
    pub crouching: bool,
}

impl Default for CharacterMotor {
    fn default() -> Self {
        Self {
            horizontal_velocity: Vec3::ZERO,
            vertical_velocity: 0.0,
            grounded: false,
            crouching: false,
        }
    }
}

/// Опорный объём персонажа (capsule: высота + центр + радиус)
///
/// Два пресета (normal / crouched) лежат в `MovementConfig`; этот компонент —
/// текущее значение, зеркалируемое в rapier `Collider` отдельной системой.
/// Инвариант: геометрия следует за `CharacterMotor::crouching` каждый тик,
/// даже если обработка движения в этот тик не выполнялась (форсированный
/// uncrouch от combat-коллаборатора не должен рассинхронизировать объём).
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct SupportVolume {
    pub height: f32,
    pub center_y: f32,
    pub radius: f32,
}

/// Текущая "ось улицы" — внешне управляемая латеральная ось движения
///
/// Градусы, оборачивается в 0..360. Выставляется path/lane коллаборатором
/// (см. `PathTurnVolume`), locomotion только читает.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct StreetAngle(f32);

impl StreetAngle {
    pub fn new(degrees: f32) -> Self {
        Self(degrees.rem_euclid(360.0))
    }

    pub fn degrees(&self) -> f32 {
        self.0
    }

    pub fn set(&mut self, degrees: f32) {
        self.0 = degrees.rem_euclid(360.0);
    }

    /// Направление вдоль улицы (+Z, повёрнутый на угол)
    pub fn direction(&self) -> Vec3 {
        Quat::from_rotation_y(self.0.to_radians()) * Vec3::Z
    }

    /// Кратчайшая угловая дистанция до `other` (градусы, всегда >= 0)
    pub fn distance_to(&self, other: f32) -> f32 {
        ((other - self.0 + 180.0).rem_euclid(360.0) - 180.0).abs()
    }
}

/// Непрерывный сигнал скорости для animation-коллаборатора
///
/// Демпфируется к текущей скорости движения; InstantStop и movement lock
/// обнуляют его мгновенно, без easing.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct LocomotionSpeed {
    pub value: f32,
}

/// Кто владеет позой персонажа в этом тике
///
/// Инвариант: ровно один владелец; переходы — только явные hand-off'ы.
/// Каждая система, пишущая Transform/velocity, гейтится на своё значение.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
#[reflect(Component)]
pub enum MovementAuthority {
    #[default]
    Locomotion,
    Choreography,
    LadderRide,
}
