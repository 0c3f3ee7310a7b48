// Presentation layer - Command line parsing and command handlers
pub mod app_state;
pub mod cli;
pub mod handlers;
