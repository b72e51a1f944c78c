pub mod classify;
pub mod describe;
pub mod diff;
pub mod families;
pub mod wait;
