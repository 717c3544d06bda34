use embassy_stm32::flash::{Blocking, Flash};

use ateam_pack_monitor::settings::{SettingsError, SettingsStore, SETTINGS_BLOB_LEN};

// last 128K sector of the F405, kept out of the program image
const SETTINGS_SECTOR_OFFSET: u32 = 0x000E_0000;
const SETTINGS_SECTOR_SIZE: u32 = 128 * 1024;

pub struct FlashSettingsStore {
    flash: Flash<'static, Blocking>,
}

impl FlashSettingsStore {
    pub fn new(flash: Flash<'static, Blocking>) -> Self {
        FlashSettingsStore { flash }
    }
}

impl SettingsStore for FlashSettingsStore {
    fn load(&mut self, buf: &mut [u8; SETTINGS_BLOB_LEN]) -> Result<(), SettingsError> {
        self.flash
            .blocking_read(SETTINGS_SECTOR_OFFSET, buf)
            .map_err(|_| SettingsError::ReadFailed)
    }

    fn save(&mut self, buf: &[u8; SETTINGS_BLOB_LEN]) -> Result<(), SettingsError> {
        self.flash
            .blocking_erase(SETTINGS_SECTOR_OFFSET, SETTINGS_SECTOR_OFFSET + SETTINGS_SECTOR_SIZE)
            .map_err(|_| SettingsError::WriteFailed)?;

        self.flash
            .blocking_write(SETTINGS_SECTOR_OFFSET, buf)
            .map_err(|_| SettingsError::WriteFailed)
    }
}
