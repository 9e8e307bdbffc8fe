//! Физическое представление персонажа
//!
//! Rapier описывает тело (KinematicPositionBased + capsule), но velocity
//! интегрирует locomotion сам. Rapier-компоненты держим синхронными:
//! - capsule collider следует за SupportVolume (crouch presets)
//! - Velocity зеркалирует CharacterMotor (для внешних наблюдателей)
//! - во время хореографии collider выключен (ColliderDisabled)

pub mod character;

pub use character::{
    character_bundle, character_groups, spawn_character, sync_support_collider,
    sync_velocity_to_rapier,
};
