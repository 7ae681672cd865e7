//! Power path gating for protocol communication.
//!
//! The adapter handshake needs VBUS sourced from somewhere before the
//! adapter answers. Boards pick one source at probe time.

use crate::drivers::dc_ic::IcResult;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SupplyError {
    NotRegistered,
    Failed,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SupplySource {
    /// dedicated boost converter
    ExternalBoost,
    /// reverse boost of the buck charger
    Charger,
    /// the board needs no gating
    Dummy,
}

pub trait PowerSupplyOps {
    fn enable(&mut self, enable: bool) -> IcResult;
}

pub struct ProtocolPowerSupply<'a> {
    source: SupplySource,
    external_boost: Option<&'a mut dyn PowerSupplyOps>,
    charger: Option<&'a mut dyn PowerSupplyOps>,
}

impl<'a> ProtocolPowerSupply<'a> {
    pub fn new(source: SupplySource) -> Self {
        Self { source, external_boost: None, charger: None }
    }

    pub fn source(&self) -> SupplySource {
        self.source
    }

    pub fn set_source(&mut self, source: SupplySource) {
        self.source = source;
    }

    pub fn register(&mut self, source: SupplySource, ops: &'a mut dyn PowerSupplyOps) {
        match source {
            SupplySource::ExternalBoost => self.external_boost = Some(ops),
            SupplySource::Charger => self.charger = Some(ops),
            SupplySource::Dummy => warn!("dummy power supply takes no ops"),
        }
    }

    pub fn enable(&mut self, enable: bool) -> Result<(), SupplyError> {
        let ops = match self.source {
            SupplySource::Dummy => return Ok(()),
            SupplySource::ExternalBoost => self.external_boost.as_deref_mut(),
            SupplySource::Charger => self.charger.as_deref_mut(),
        };

        let Some(ops) = ops else {
            error!("{} power supply ops is null", self.source);
            return Err(SupplyError::NotRegistered);
        };

        match ops.enable(enable) {
            Ok(()) => {
                info!("power supply ok, enable={}", enable);
                Ok(())
            }
            Err(_) => {
                error!("power supply fail, enable={}", enable);
                Err(SupplyError::Failed)
            }
        }
    }
}
