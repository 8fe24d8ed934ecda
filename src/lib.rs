pub mod app;
pub mod cache;
pub mod cli;
pub mod display;
pub mod error;
pub mod input;
pub mod numeric;
pub mod tokens;
pub mod util;
