pub mod event;
pub mod machine;
pub mod session;
pub mod world;
