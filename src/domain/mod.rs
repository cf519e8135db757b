pub mod direction;
pub mod rules;
