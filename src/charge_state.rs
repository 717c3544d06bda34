use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

/// Remaining charge of the pack plus the last current the sensor reported.
///
/// Charge is in tenths of a microamp-hour and always within `0..=max_pack_ah`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargeState {
    pub current_pack_ah: i32,
    pub max_pack_ah: i32,
    pub last_current_ma: i32,
}

impl ChargeState {
    pub fn new(current_pack_ah: i32, max_pack_ah: i32) -> ChargeState {
        let mut state = ChargeState {
            current_pack_ah,
            max_pack_ah,
            last_current_ma: 0,
        };
        state.clamp();
        state
    }

    /// Remove `delta` from the pack. Positive deltas discharge.
    ///
    /// A discharge larger than what is left empties the pack; a charge past
    /// capacity saturates at `max_pack_ah`.
    pub fn apply_delta(&mut self, delta: i64) {
        let current = self.current_pack_ah as i64;
        let next = if delta < 0 || delta <= current {
            current.saturating_sub(delta)
        } else {
            0
        };

        self.current_pack_ah = next.clamp(0, self.max_pack_ah.max(0) as i64) as i32;
    }

    pub fn clamp(&mut self) {
        if self.max_pack_ah < 0 {
            self.max_pack_ah = 0;
        }
        if self.current_pack_ah < 0 {
            self.current_pack_ah = 0;
        }
        if self.current_pack_ah > self.max_pack_ah {
            self.current_pack_ah = self.max_pack_ah;
        }
    }
}

pub struct SharedChargeState {
    inner: Mutex<CriticalSectionRawMutex, Cell<ChargeState>>,
}

impl SharedChargeState {
    pub const fn new(state: ChargeState) -> SharedChargeState {
        SharedChargeState {
            inner: Mutex::new(Cell::new(state)),
        }
    }

    pub fn get_state(&self) -> ChargeState {
        self.inner.lock(|s| s.get())
    }

    pub fn get_current_pack_ah(&self) -> i32 {
        self.get_state().current_pack_ah
    }

    pub fn get_last_current_ma(&self) -> i32 {
        self.get_state().last_current_ma
    }

    /// Run `f` on the state inside one critical section.
    pub fn update<R>(&self, f: impl FnOnce(&mut ChargeState) -> R) -> R {
        self.inner.lock(|s| {
            let mut state = s.get();
            let ret = f(&mut state);
            s.set(state);
            ret
        })
    }

    /// Replace the charge counters, e.g. after `CURAH`/`MAXAH` from the console.
    pub fn set_charge(&self, current_pack_ah: i32, max_pack_ah: i32) {
        self.update(|s| {
            s.max_pack_ah = max_pack_ah;
            s.current_pack_ah = current_pack_ah;
            s.clamp();
        });
    }
}
