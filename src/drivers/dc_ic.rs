//! Direct charge switch IC and battery info operation tables.
//!
//! All calls are blocking register I/O. Drivers retry transport errors
//! internally and only surface what is left.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IcError {
    Io,
    NotSupported,
    InvalidParam,
}

impl IcError {
    /// Negative code used when several results are summed into one.
    pub const fn errno(self) -> i32 {
        match self {
            IcError::NotSupported => -1,
            IcError::Io => -5,
            IcError::InvalidParam => -22,
        }
    }
}

pub type IcResult<T = ()> = Result<T, IcError>;

pub trait DcIcOps {
    fn name(&self) -> &str;

    fn ic_init(&mut self) -> IcResult;
    fn ic_exit(&mut self) -> IcResult;
    fn ic_enable(&mut self, enable: bool) -> IcResult;

    fn irq_enable(&mut self, _enable: bool) -> IcResult {
        Err(IcError::NotSupported)
    }

    fn adc_enable(&mut self, _enable: bool) -> IcResult {
        Err(IcError::NotSupported)
    }

    fn discharge(&mut self, _enable: bool) -> IcResult {
        Err(IcError::NotSupported)
    }

    fn is_ic_close(&mut self) -> IcResult<bool> {
        Err(IcError::NotSupported)
    }

    fn supports_prepare(&self) -> bool {
        false
    }

    fn ic_enable_prepare(&mut self) -> IcResult {
        Err(IcError::NotSupported)
    }

    fn config_watchdog(&mut self, _time_ms: u32) -> IcResult {
        Err(IcError::NotSupported)
    }

    fn kick_watchdog(&mut self) -> IcResult {
        Err(IcError::NotSupported)
    }

    fn ic_id(&mut self) -> IcResult<i32> {
        Err(IcError::NotSupported)
    }

    // chips without a status register always report healthy
    fn ic_status(&mut self) -> IcResult {
        Ok(())
    }

    fn set_buck_enable(&mut self, _enable: bool) -> IcResult {
        Err(IcError::NotSupported)
    }

    fn reg_reset_and_init(&mut self) -> IcResult {
        Err(IcError::NotSupported)
    }

    fn freq(&mut self) -> IcResult<u32> {
        Err(IcError::NotSupported)
    }

    fn set_freq(&mut self, _freq: u32) -> IcResult {
        Ok(())
    }
}

/// Battery side telemetry of one switch IC. Voltages in mV, currents in mA.
pub trait BatInfoOps {
    fn init(&mut self) -> IcResult;
    fn exit(&mut self) -> IcResult;

    fn bat_btb_voltage(&mut self) -> IcResult<i32>;
    fn bat_package_voltage(&mut self) -> IcResult<i32>;
    fn vbus_voltage(&mut self) -> IcResult<i32>;
    fn bat_current(&mut self) -> IcResult<i32>;
    fn ic_ibus(&mut self) -> IcResult<i32>;

    fn ic_temp(&mut self) -> IcResult<i32> {
        Ok(0)
    }

    fn ic_vusb(&mut self) -> IcResult<i32> {
        Err(IcError::NotSupported)
    }

    fn ic_vout(&mut self) -> IcResult<i32> {
        Err(IcError::NotSupported)
    }
}

/// Coulomb counter readings, preferred over IC ADC samples when configured.
pub trait FuelGauge {
    fn bat_current_now(&mut self) -> i32;
    fn bat_voltage_now(&mut self) -> i32;
}
