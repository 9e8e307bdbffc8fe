//! ECS Components персонажа
//!
//! Организация по доменам:
//! - character: состояние персонажа (CharacterMotor, SupportVolume, StreetAngle, MovementAuthority)
//! - input: абстрактный input surface (CharacterInput, без device binding)
//! - lock: арбитраж блокировок движения (MovementLock)

pub mod character;
pub mod input;
pub mod lock;

// Re-exports для удобного импорта
pub use character::*;
pub use input::*;
pub use lock::*;
