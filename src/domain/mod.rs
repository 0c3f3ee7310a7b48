// Domain layer - Core business entities
pub mod dashboard;
pub mod events;
pub mod grid;
pub mod lenient;
pub mod panel;
pub mod repeat;
pub mod variable;
