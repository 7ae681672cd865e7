#![cfg_attr(not(test), no_std)]

#[macro_use]
pub(crate) mod fmt;

pub mod charger;
pub mod config;
pub mod drivers;
pub mod dsm;
pub mod power;
pub mod protocol;
pub mod units;
