//! Direct charge power path: IC addressing types, the IC manager facade, the
//! voltage compensation engine, the multi-IC consistency checker and
//! protocol power supply gating.

use heapless::Vec;

pub mod comp;
pub mod ic_manager;
pub mod ic_para;
pub mod multi_ic_check;
pub mod supply;

pub const CHARGE_IC_MAX_NUM: usize = 2;
pub const CHARGE_PATH_MAX_NUM: usize = 2;

// concrete IC slots, main is always resolved before aux
pub const IC_ONE: usize = 0;
pub const IC_TWO: usize = 1;

/// Resolved IC indices for one operation, in execution order.
pub type IcIndexList = Vec<usize, CHARGE_IC_MAX_NUM>;

/// Bitmask of physical charge paths an operation targets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargePath(u32);

impl ChargePath {
    pub const NONE: Self = Self(0);
    pub const MAIN: Self = Self(1 << 0);
    pub const AUX: Self = Self(1 << 1);
    pub const MULTI: Self = Self(Self::MAIN.0 | Self::AUX.0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Path of a single physical path index, `BIT(index)`.
    pub const fn from_index(index: usize) -> Self {
        Self(1 << index)
    }

    pub const fn intersects(self, other: ChargePath) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains_index(self, index: usize) -> bool {
        index < 32 && self.0 & (1 << index) != 0
    }

    /// A path is only addressable when it names at least one known path.
    pub const fn is_valid(self) -> bool {
        self.intersects(Self::MULTI)
    }

    /// Index into two-element per-path tables (`[main, aux]`).
    pub const fn table_index(self) -> Option<usize> {
        match self.0 {
            0b01 | 0b11 => Some(IC_ONE),
            0b10 => Some(IC_TWO),
            _ => None,
        }
    }
}

/// Direct charge working mode, selects which IC operation table is used.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeMode {
    Lvc,
    Sc,
    Sc4,
}

impl ChargeMode {
    pub const COUNT: usize = 3;
    pub const ALL: [ChargeMode; Self::COUNT] = [ChargeMode::Lvc, ChargeMode::Sc, ChargeMode::Sc4];

    pub const fn index(self) -> usize {
        match self {
            ChargeMode::Lvc => 0,
            ChargeMode::Sc => 1,
            ChargeMode::Sc4 => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ChargeMode::Lvc => "lvc_mode",
            ChargeMode::Sc => "sc_mode",
            ChargeMode::Sc4 => "sc4_mode",
        }
    }

    /// With two stage charging the 4:1 stage runs on the 2:1 operation tables.
    pub const fn effective(self, use_two_stage: bool) -> ChargeMode {
        match self {
            ChargeMode::Sc4 if use_two_stage => ChargeMode::Sc,
            mode => mode,
        }
    }
}
