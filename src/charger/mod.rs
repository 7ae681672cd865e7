//! Charge session controllers sitting on top of the adapter protocols.

use embassy_time::Duration;

use crate::drivers::dc_ic::IcResult;

pub mod dc_adapter;
pub mod hvdcp;

pub const ADAPTER_5V: u32 = 5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerType {
    Usb,
    /// charging downstream port
    BcUsb,
    NonStandard,
    /// dedicated charging port
    Standard,
    Fcp,
    Removed,
    Unknown,
}

/// Buck charger and platform services the session controllers need.
pub trait ChargerPlatform {
    /// VBUS is absent or unstable, the adapter cannot be talked to.
    fn not_power_good(&mut self) -> bool;
    fn charger_online(&mut self) -> bool;
    /// mV
    fn vbus(&mut self) -> i32;
    /// mA, negative while charging.
    fn battery_current(&mut self) -> i32;
    fn battery_series(&self) -> i32;
    fn is_factory_mode(&self) -> bool;

    fn set_mivr(&mut self, mv: i32) -> IcResult;
    /// Input voltage setting of the buck charger, in V.
    fn set_vbus_vset(&mut self, volt: u32) -> IcResult;

    fn direct_charge_failed(&self) -> bool;

    /// The adapter was already authenticated by a higher priority path.
    fn direct_charge_priority_inversion(&self) -> bool {
        false
    }

    fn delay(&mut self, duration: Duration);
}

impl<T: ChargerPlatform + ?Sized> ChargerPlatform for &mut T {
    fn not_power_good(&mut self) -> bool {
        (**self).not_power_good()
    }

    fn charger_online(&mut self) -> bool {
        (**self).charger_online()
    }

    fn vbus(&mut self) -> i32 {
        (**self).vbus()
    }

    fn battery_current(&mut self) -> i32 {
        (**self).battery_current()
    }

    fn battery_series(&self) -> i32 {
        (**self).battery_series()
    }

    fn is_factory_mode(&self) -> bool {
        (**self).is_factory_mode()
    }

    fn set_mivr(&mut self, mv: i32) -> IcResult {
        (**self).set_mivr(mv)
    }

    fn set_vbus_vset(&mut self, volt: u32) -> IcResult {
        (**self).set_vbus_vset(volt)
    }

    fn direct_charge_failed(&self) -> bool {
        (**self).direct_charge_failed()
    }

    fn direct_charge_priority_inversion(&self) -> bool {
        (**self).direct_charge_priority_inversion()
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}

/// Which side of the link a soft reset targets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetTarget {
    Adapter,
    Master,
}
