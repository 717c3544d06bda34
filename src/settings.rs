use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::config::*;
use crate::fmt::LogLevel;

pub const SETTINGS_BLOB_LEN: usize = 104;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// stored blob was written by a different layout version (or marked for factory reset)
    VersionMismatch(u8),
    ReadFailed,
    WriteFailed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermistorCoefficients {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub adc_to_volts: f32,
}

impl ThermistorCoefficients {
    pub const fn factory_default() -> Self {
        ThermistorCoefficients {
            a: DEFAULT_THERMISTOR_A,
            b: DEFAULT_THERMISTOR_B,
            c: DEFAULT_THERMISTOR_C,
            adc_to_volts: DEFAULT_THERMISTOR_ADC_TO_VOLTS,
        }
    }
}

/// Calibration and configuration for the whole monitor.
///
/// Charge is in tenths of a microamp-hour.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PackSettings {
    pub version: u8,
    pub log_level: LogLevel,
    pub can_enabled: bool,
    pub can_bitrate: u32,
    pub sensor_address: u16,
    pub balance_threshold_mv: i32,
    pub voltage_multipliers: [f32; NUM_BANKS],
    pub thermistor_coefficients: [ThermistorCoefficients; NUM_BANKS],
    pub current_pack_ah: i32,
    pub max_pack_ah: i32,
}

impl PackSettings {
    pub const fn factory_default() -> Self {
        PackSettings {
            version: SETTINGS_VERSION,
            log_level: LogLevel::Info,
            can_enabled: DEFAULT_CAN_ENABLED,
            can_bitrate: DEFAULT_CAN_BITRATE,
            sensor_address: DEFAULT_SENSOR_ADDRESS,
            balance_threshold_mv: DEFAULT_BALANCE_THRESHOLD_MV,
            voltage_multipliers: [DEFAULT_VOLTAGE_MULTIPLIER; NUM_BANKS],
            thermistor_coefficients: [ThermistorCoefficients::factory_default(); NUM_BANKS],
            current_pack_ah: DEFAULT_CURRENT_PACK_AH,
            max_pack_ah: DEFAULT_MAX_PACK_AH,
        }
    }

    /// Flag the settings so the next boot loads factory defaults.
    pub fn mark_factory_reset(&mut self) {
        self.version = SETTINGS_FACTORY_RESET_MARKER;
    }

    // layout (little endian):
    //   0 version, 1 log level, 2 can enabled, 3 pad,
    //   4 can bitrate u32, 8 sensor address u16, 10 pad,
    //   12 balance threshold i32, 16 voltage multipliers 4 x f32,
    //   32 thermistor coefficients 4 x (a, b, c, adc_to_volts) f32,
    //   96 current pack charge i32, 100 max pack charge i32
    pub fn to_bytes(&self) -> [u8; SETTINGS_BLOB_LEN] {
        let mut buf = [0u8; SETTINGS_BLOB_LEN];
        buf[0] = self.version;
        buf[1] = self.log_level as u8;
        buf[2] = self.can_enabled as u8;
        buf[4..8].copy_from_slice(&self.can_bitrate.to_le_bytes());
        buf[8..10].copy_from_slice(&self.sensor_address.to_le_bytes());
        buf[12..16].copy_from_slice(&self.balance_threshold_mv.to_le_bytes());

        for (i, mult) in self.voltage_multipliers.iter().enumerate() {
            let off = 16 + i * 4;
            buf[off..off + 4].copy_from_slice(&mult.to_le_bytes());
        }

        for (i, coeff) in self.thermistor_coefficients.iter().enumerate() {
            let off = 32 + i * 16;
            buf[off..off + 4].copy_from_slice(&coeff.a.to_le_bytes());
            buf[off + 4..off + 8].copy_from_slice(&coeff.b.to_le_bytes());
            buf[off + 8..off + 12].copy_from_slice(&coeff.c.to_le_bytes());
            buf[off + 12..off + 16].copy_from_slice(&coeff.adc_to_volts.to_le_bytes());
        }

        buf[96..100].copy_from_slice(&self.current_pack_ah.to_le_bytes());
        buf[100..104].copy_from_slice(&self.max_pack_ah.to_le_bytes());

        buf
    }

    pub fn from_bytes(buf: &[u8; SETTINGS_BLOB_LEN]) -> Result<Self, SettingsError> {
        if buf[0] != SETTINGS_VERSION {
            return Err(SettingsError::VersionMismatch(buf[0]));
        }

        let mut voltage_multipliers = [0.0f32; NUM_BANKS];
        for (i, mult) in voltage_multipliers.iter_mut().enumerate() {
            *mult = read_f32(buf, 16 + i * 4);
        }

        let mut thermistor_coefficients = [ThermistorCoefficients::factory_default(); NUM_BANKS];
        for (i, coeff) in thermistor_coefficients.iter_mut().enumerate() {
            let off = 32 + i * 16;
            *coeff = ThermistorCoefficients {
                a: read_f32(buf, off),
                b: read_f32(buf, off + 4),
                c: read_f32(buf, off + 8),
                adc_to_volts: read_f32(buf, off + 12),
            };
        }

        Ok(PackSettings {
            version: buf[0],
            log_level: LogLevel::from_u8(buf[1]).unwrap_or(LogLevel::Info),
            can_enabled: buf[2] != 0,
            can_bitrate: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            sensor_address: u16::from_le_bytes([buf[8], buf[9]]) & MAX_SENSOR_ADDRESS,
            balance_threshold_mv: read_i32(buf, 12),
            voltage_multipliers,
            thermistor_coefficients,
            current_pack_ah: read_i32(buf, 96),
            max_pack_ah: read_i32(buf, 100),
        })
    }
}

impl Default for PackSettings {
    fn default() -> Self {
        Self::factory_default()
    }
}

fn read_f32(buf: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Non-volatile home for the settings blob.
pub trait SettingsStore {
    fn load(&mut self, buf: &mut [u8; SETTINGS_BLOB_LEN]) -> Result<(), SettingsError>;

    fn save(&mut self, buf: &[u8; SETTINGS_BLOB_LEN]) -> Result<(), SettingsError>;
}

/// Read settings from `store`, falling back to factory defaults on any error.
pub fn load_settings(store: &mut dyn SettingsStore) -> PackSettings {
    let mut buf = [0u8; SETTINGS_BLOB_LEN];
    if store.load(&mut buf).is_err() {
        error!("settings read failed, using factory defaults");
        return PackSettings::factory_default();
    }

    match PackSettings::from_bytes(&buf) {
        Ok(settings) => settings,
        Err(SettingsError::VersionMismatch(version)) => {
            info!("settings version {} != {}, loading factory defaults", version, SETTINGS_VERSION);
            PackSettings::factory_default()
        }
        Err(_) => PackSettings::factory_default(),
    }
}

/// Write `settings` to `store`, skipping the write when the stored blob
/// already matches. A flash store erases a whole sector per save and the core
/// stalls on instruction fetch while it does.
pub fn save_settings(store: &mut dyn SettingsStore, settings: &PackSettings) -> Result<(), SettingsError> {
    let blob = settings.to_bytes();

    let mut stored = [0u8; SETTINGS_BLOB_LEN];
    if store.load(&mut stored).is_ok() && stored == blob {
        debug!("settings unchanged, skipping write");
        return Ok(());
    }

    store.save(&blob).inspect_err(|_| {
        error!("settings write failed");
    })
}

/// Settings blob held in RAM. Starts erased (all 0xFF), like fresh flash.
pub struct RamSettingsStore {
    blob: [u8; SETTINGS_BLOB_LEN],
    pub saves: usize,
}

impl RamSettingsStore {
    pub const fn new() -> Self {
        RamSettingsStore {
            blob: [0xFF; SETTINGS_BLOB_LEN],
            saves: 0,
        }
    }

    pub fn blob(&self) -> &[u8; SETTINGS_BLOB_LEN] {
        &self.blob
    }
}

impl Default for RamSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for RamSettingsStore {
    fn load(&mut self, buf: &mut [u8; SETTINGS_BLOB_LEN]) -> Result<(), SettingsError> {
        buf.copy_from_slice(&self.blob);
        Ok(())
    }

    fn save(&mut self, buf: &[u8; SETTINGS_BLOB_LEN]) -> Result<(), SettingsError> {
        self.blob.copy_from_slice(buf);
        self.saves += 1;
        Ok(())
    }
}

/// Settings shared between the sampler, the CAN task and the console.
///
/// Readers take a snapshot; console writes are visible on the next read.
pub struct SharedSettings {
    inner: Mutex<CriticalSectionRawMutex, Cell<PackSettings>>,
}

impl SharedSettings {
    pub const fn new(settings: PackSettings) -> Self {
        SharedSettings {
            inner: Mutex::new(Cell::new(settings)),
        }
    }

    pub fn get(&self) -> PackSettings {
        self.inner.lock(|s| s.get())
    }

    pub fn set(&self, settings: PackSettings) {
        self.inner.lock(|s| s.set(settings));
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut PackSettings) -> R) -> R {
        self.inner.lock(|s| {
            let mut settings = s.get();
            let ret = f(&mut settings);
            s.set(settings);
            ret
        })
    }

    pub fn get_can_enabled(&self) -> bool {
        self.get().can_enabled
    }

    pub fn get_sensor_address(&self) -> u16 {
        self.get().sensor_address
    }

    pub fn get_balance_threshold_mv(&self) -> i32 {
        self.get().balance_threshold_mv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip_keeps_calibration() {
        let mut settings = PackSettings::factory_default();
        settings.voltage_multipliers[2] = 0.0035;
        settings.thermistor_coefficients[3].c = 1.5e-7;
        settings.sensor_address = 0x123;
        settings.current_pack_ah = 42;

        let decoded = PackSettings::from_bytes(&settings.to_bytes());
        assert_eq!(decoded, Ok(settings));
    }

    #[test]
    fn erased_store_loads_defaults() {
        let mut store = RamSettingsStore::new();
        assert_eq!(load_settings(&mut store), PackSettings::factory_default());
    }

    #[test]
    fn factory_reset_marker_loads_defaults() {
        let mut store = RamSettingsStore::new();
        let mut settings = PackSettings::factory_default();
        settings.balance_threshold_mv = 250;
        save_settings(&mut store, &settings).unwrap();
        assert_eq!(load_settings(&mut store).balance_threshold_mv, 250);

        settings.mark_factory_reset();
        save_settings(&mut store, &settings).unwrap();
        assert_eq!(store.blob()[0], SETTINGS_FACTORY_RESET_MARKER);
        assert_eq!(load_settings(&mut store), PackSettings::factory_default());
    }

    #[test]
    fn unchanged_settings_are_not_rewritten() {
        let mut store = RamSettingsStore::new();
        let mut settings = PackSettings::factory_default();

        save_settings(&mut store, &settings).unwrap();
        save_settings(&mut store, &settings).unwrap();
        assert_eq!(store.saves, 1);

        settings.balance_threshold_mv = 120;
        save_settings(&mut store, &settings).unwrap();
        assert_eq!(store.saves, 2);
        assert_eq!(load_settings(&mut store).balance_threshold_mv, 120);
    }

    #[test]
    fn shared_update_is_visible() {
        let shared = SharedSettings::new(PackSettings::factory_default());
        shared.update(|s| s.can_enabled = false);
        assert!(!shared.get_can_enabled());
        assert_eq!(shared.get_sensor_address(), DEFAULT_SENSOR_ADDRESS);
    }
}
