// Library root - layered dashboard schema migration engine
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
