pub mod app;
pub mod capability;
pub mod config;
pub mod distort;
pub mod error;
pub mod export;
pub mod frame;
pub mod interrupt;
pub mod keymap;
pub mod logging;
pub mod model;
pub mod playback;
pub mod prefs;
pub mod render;
pub mod session;
pub mod terminal;
pub mod video;
