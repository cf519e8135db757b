pub mod gamepad;
pub mod input;
pub mod renderer;
pub mod router;
pub mod sound;
