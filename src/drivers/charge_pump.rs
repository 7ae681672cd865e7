//! First level charge pumps sitting in front of the direct charge switches.

use super::dc_ic::{IcError, IcResult};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CpType {
    Main,
    Aux,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CpMode {
    /// bypass, output follows input
    Bp,
    /// fixed ratio conversion
    Cp,
}

pub trait ChargePumpOps {
    fn chip_init(&mut self) -> IcResult;
    fn chip_enable(&mut self, enable: bool) -> IcResult;
    fn set_bp_mode(&mut self) -> IcResult;
    fn set_cp_mode(&mut self) -> IcResult;
    fn is_cp_open(&mut self) -> bool;
    fn is_bp_open(&mut self) -> bool;
}

/// Main and aux pump pair. Either slot may be unpopulated.
pub struct ChargePumpPair<'a> {
    main: Option<&'a mut dyn ChargePumpOps>,
    aux: Option<&'a mut dyn ChargePumpOps>,
}

impl<'a> ChargePumpPair<'a> {
    pub fn new(main: Option<&'a mut dyn ChargePumpOps>, aux: Option<&'a mut dyn ChargePumpOps>) -> Self {
        Self { main, aux }
    }

    pub const fn empty() -> Self {
        Self { main: None, aux: None }
    }

    fn pump(&mut self, cp_type: CpType) -> IcResult<&mut dyn ChargePumpOps> {
        let slot = match cp_type {
            CpType::Main => &mut self.main,
            CpType::Aux => &mut self.aux,
        };

        match slot {
            Some(ops) => Ok(&mut **ops),
            None => Err(IcError::NotSupported),
        }
    }

    pub fn chip_init(&mut self, cp_type: CpType) -> IcResult {
        self.pump(cp_type)?.chip_init()
    }

    pub fn chip_enable(&mut self, cp_type: CpType, enable: bool) -> IcResult {
        self.pump(cp_type)?.chip_enable(enable)
    }

    pub fn set_mode(&mut self, cp_type: CpType, mode: CpMode) -> IcResult {
        let pump = self.pump(cp_type)?;
        match mode {
            CpMode::Bp => pump.set_bp_mode(),
            CpMode::Cp => pump.set_cp_mode(),
        }
    }

    pub fn is_cp_open(&mut self, cp_type: CpType) -> bool {
        self.pump(cp_type).map(|p| p.is_cp_open()).unwrap_or(false)
    }

    pub fn is_bp_open(&mut self, cp_type: CpType) -> bool {
        self.pump(cp_type).map(|p| p.is_bp_open()).unwrap_or(false)
    }
}
