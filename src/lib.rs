pub mod config;
pub mod core;
pub mod display;
pub mod game;
pub mod network;
