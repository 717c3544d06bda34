#![cfg_attr(not(test), no_std)]

// this must come first so the logging macros are visible to every module
pub mod fmt;

pub mod can;
pub mod charge_state;
pub mod config;
pub mod console;
pub mod current_sensor;
pub mod diagnostics;
pub mod drivers;
pub mod filter;
pub mod math;
pub mod readings;
pub mod sampler;
pub mod settings;
