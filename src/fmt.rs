#![macro_use]
#![allow(unused_macros)]

//! Logging macros for the library.
//!
//! Everything forwards to `defmt` when the `defmt` feature is enabled. The
//! firmware additionally filters at run time on the level configured from the
//! console (`LOGLEVEL=n`). Host builds without `defmt` compile the macros
//! away but still evaluate nothing and use every argument.

use core::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Off = 4,
}

impl LogLevel {
    pub const fn from_u8(level: u8) -> Option<LogLevel> {
        match level {
            0 => Some(LogLevel::Debug),
            1 => Some(LogLevel::Info),
            2 => Some(LogLevel::Warn),
            3 => Some(LogLevel::Error),
            4 => Some(LogLevel::Off),
            _ => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warning",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed)).unwrap_or(LogLevel::Info)
}

/// True if a message at `level` passes the run-time filter.
pub fn enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level >= log_level()
}

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        let _ = if $crate::fmt::enabled($crate::fmt::LogLevel::Debug) {
            ::defmt::trace!($s $(, $x)*);
        };
        #[cfg(not(feature = "defmt"))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        let _ = if $crate::fmt::enabled($crate::fmt::LogLevel::Debug) {
            ::defmt::debug!($s $(, $x)*);
        };
        #[cfg(not(feature = "defmt"))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        let _ = if $crate::fmt::enabled($crate::fmt::LogLevel::Info) {
            ::defmt::info!($s $(, $x)*);
        };
        #[cfg(not(feature = "defmt"))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        let _ = if $crate::fmt::enabled($crate::fmt::LogLevel::Warn) {
            ::defmt::warn!($s $(, $x)*);
        };
        #[cfg(not(feature = "defmt"))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        let _ = if $crate::fmt::enabled($crate::fmt::LogLevel::Error) {
            ::defmt::error!($s $(, $x)*);
        };
        #[cfg(not(feature = "defmt"))]
        let _ = ($( & $x ),*);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filter() {
        set_log_level(LogLevel::Warn);
        assert!(!enabled(LogLevel::Info));
        assert!(enabled(LogLevel::Warn));
        assert!(enabled(LogLevel::Error));

        set_log_level(LogLevel::Off);
        assert!(!enabled(LogLevel::Error));
        assert!(!enabled(LogLevel::Off));

        set_log_level(LogLevel::Info);
    }

    #[test]
    fn level_codes() {
        assert_eq!(LogLevel::from_u8(0), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_u8(4), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_u8(5), None);
    }
}
