pub mod pitch;
pub mod pitch_slot;
pub mod slot;
