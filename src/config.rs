// Timing
// one tick reads the previous conversion and starts the next one on both converters.
// ADS1110 at 15 SPS needs at least 67ms per conversion, so 80ms leaves margin and
// the whole pack (4 voltage + 4 thermistor channels) is characterized every 320ms.
pub const SAMPLE_TICK_PERIOD_MS: u64 = 80;
pub const SAMPLE_WINDOW_SIZE: usize = 32;
pub const NUM_BANKS: usize = 4;

// Converters
pub const VOLTAGE_ADC_ADDR: u8 = 0x48;
pub const THERMISTOR_ADC_ADDR: u8 = 0x49;

// ST/DRDY = 1 (start), SC = 1 (single-shot), DR = 11 (15 SPS), PGA = 00 (gain 1)
pub const ADS1110_CONFIG: u8 = 0x9C;
// ST/DRDY still set in the status byte means the conversion isn't done
pub const ADS1110_NOT_READY: u8 = 0x80;

// Console
pub const CONSOLE_LINE_MAX: usize = 80;

// Settings
pub const SETTINGS_VERSION: u8 = 1;
pub const SETTINGS_FACTORY_RESET_MARKER: u8 = 0xFF;

pub const DEFAULT_CAN_ENABLED: bool = true;
pub const DEFAULT_CAN_BITRATE: u32 = 500_000;
pub const MAX_CAN_BITRATE: u32 = 1_000_000;
pub const DEFAULT_SENSOR_ADDRESS: u16 = 0x3C2;
pub const MAX_SENSOR_ADDRESS: u16 = 0x7FF;
pub const DEFAULT_BALANCE_THRESHOLD_MV: i32 = 100;

// 2.048V full scale over a 32768 code range, behind a 50:1 divider
pub const DEFAULT_VOLTAGE_MULTIPLIER: f32 = 0.003125;
pub const DEFAULT_THERMISTOR_ADC_TO_VOLTS: f32 = 0.0000625;

// Steinhart-Hart coefficients for a 10k NTC
pub const DEFAULT_THERMISTOR_A: f32 = 0.001129148;
pub const DEFAULT_THERMISTOR_B: f32 = 0.000234125;
pub const DEFAULT_THERMISTOR_C: f32 = 0.0000000876741;

// Charge, in tenths of a microamp-hour (100Ah pack)
pub const DEFAULT_MAX_PACK_AH: i32 = 1_000_000_000;
pub const DEFAULT_CURRENT_PACK_AH: i32 = DEFAULT_MAX_PACK_AH;

// mA * ms -> tenths of uAh: * 10_000 / 3_600_000
pub const CHARGE_DELTA_DIVISOR: i64 = 360;
// elapsed time credited to the very first data frame
pub const FIRST_FRAME_ELAPSED_MS: u64 = 1;
