use ateam_pack_monitor::{
    config::{DEFAULT_BALANCE_THRESHOLD_MV, DEFAULT_CAN_BITRATE, DEFAULT_SENSOR_ADDRESS, SETTINGS_VERSION},
    settings::{load_settings, save_settings, PackSettings, RamSettingsStore, SettingsError, SettingsStore, SETTINGS_BLOB_LEN},
};

struct BrokenStore;

impl SettingsStore for BrokenStore {
    fn load(&mut self, _buf: &mut [u8; SETTINGS_BLOB_LEN]) -> Result<(), SettingsError> {
        Err(SettingsError::ReadFailed)
    }

    fn save(&mut self, _buf: &[u8; SETTINGS_BLOB_LEN]) -> Result<(), SettingsError> {
        Err(SettingsError::WriteFailed)
    }
}

#[test]
fn factory_defaults() {
    let settings = PackSettings::factory_default();

    assert_eq!(SETTINGS_VERSION, settings.version);
    assert_eq!(DEFAULT_CAN_BITRATE, settings.can_bitrate);
    assert_eq!(0x3C2, DEFAULT_SENSOR_ADDRESS);
    assert_eq!(DEFAULT_SENSOR_ADDRESS, settings.sensor_address);
    assert_eq!(DEFAULT_BALANCE_THRESHOLD_MV, settings.balance_threshold_mv);
    assert!(settings.current_pack_ah <= settings.max_pack_ah);
}

#[test]
fn unreadable_store_falls_back_to_defaults() {
    let mut store = BrokenStore;

    assert_eq!(PackSettings::factory_default(), load_settings(&mut store));
    assert_eq!(
        Err(SettingsError::WriteFailed),
        save_settings(&mut store, &PackSettings::factory_default())
    );
}

#[test]
fn layout_is_little_endian() {
    let mut settings = PackSettings::factory_default();
    settings.can_bitrate = 0x0001_E848;
    settings.sensor_address = 0x3C2;

    let blob = settings.to_bytes();
    assert_eq!(SETTINGS_VERSION, blob[0]);
    assert_eq!([0x48, 0xE8, 0x01, 0x00], blob[4..8]);
    assert_eq!([0xC2, 0x03], blob[8..10]);
}

#[test]
fn other_versions_load_defaults() {
    let mut store = RamSettingsStore::new();
    let mut settings = PackSettings::factory_default();
    settings.balance_threshold_mv = 42;

    let mut blob = settings.to_bytes();
    blob[0] = SETTINGS_VERSION + 1;
    store.save(&blob).unwrap();

    assert_eq!(Err(SettingsError::VersionMismatch(SETTINGS_VERSION + 1)), PackSettings::from_bytes(&blob));
    assert_eq!(PackSettings::factory_default(), load_settings(&mut store));
}
