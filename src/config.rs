//! Probe time configuration.
//!
//! Tables are read once through a [`PropertySource`] (board description, a
//! const [`PropertyTable`], ...). Scalars fall back to a caller default when
//! absent; array readers report a [`ConfigError`] and leave the caller's table
//! in its zeroed state.

use heapless::Vec;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    Missing,
    Malformed,
    TooLong,
}

pub trait PropertySource {
    fn read_u32(&self, key: &str) -> Option<u32>;

    /// Copies the integer array stored under `key` into `out` and returns the
    /// element count.
    fn read_i32_array(&self, key: &str, out: &mut [i32]) -> Result<usize, ConfigError>;

    /// Copies the string array stored under `key` into `out` and returns the
    /// element count.
    fn read_str_array<'a>(&'a self, key: &str, out: &mut [&'a str]) -> Result<usize, ConfigError>;
}

#[derive(Clone, Copy, Debug)]
pub enum PropertyValue<'a> {
    U32(u32),
    I32Array(&'a [i32]),
    StrArray(&'a [&'a str]),
}

/// Key/value property set, usable as a `const` board description.
#[derive(Clone, Copy, Debug)]
pub struct PropertyTable<'a> {
    entries: &'a [(&'a str, PropertyValue<'a>)],
}

impl<'a> PropertyTable<'a> {
    pub const EMPTY: PropertyTable<'static> = PropertyTable { entries: &[] };

    pub const fn new(entries: &'a [(&'a str, PropertyValue<'a>)]) -> Self {
        Self { entries }
    }

    fn find(&self, key: &str) -> Option<&PropertyValue<'a>> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

impl<'t> PropertySource for PropertyTable<'t> {
    fn read_u32(&self, key: &str) -> Option<u32> {
        match self.find(key) {
            Some(PropertyValue::U32(v)) => Some(*v),
            _ => None,
        }
    }

    fn read_i32_array(&self, key: &str, out: &mut [i32]) -> Result<usize, ConfigError> {
        match self.find(key) {
            Some(PropertyValue::I32Array(data)) => {
                if data.len() > out.len() {
                    return Err(ConfigError::TooLong);
                }
                out[..data.len()].copy_from_slice(data);
                Ok(data.len())
            }
            Some(_) => Err(ConfigError::Malformed),
            None => Err(ConfigError::Missing),
        }
    }

    fn read_str_array<'a>(&'a self, key: &str, out: &mut [&'a str]) -> Result<usize, ConfigError> {
        match self.find(key) {
            Some(PropertyValue::StrArray(data)) => {
                if data.len() > out.len() {
                    return Err(ConfigError::TooLong);
                }
                for (slot, s) in out.iter_mut().zip(data.iter()) {
                    *slot = *s;
                }
                Ok(data.len())
            }
            Some(_) => Err(ConfigError::Malformed),
            None => Err(ConfigError::Missing),
        }
    }
}

pub fn read_u32_or<S: PropertySource + ?Sized>(src: &S, key: &str, default: u32) -> u32 {
    match src.read_u32(key) {
        Some(value) => value,
        None => {
            debug!("{} not found, use default {}", key, default);
            default
        }
    }
}

pub fn read_bool_or<S: PropertySource + ?Sized>(src: &S, key: &str, default: bool) -> bool {
    read_u32_or(src, key, default as u32) != 0
}

/// Reads a row-major integer table of `cols` columns holding at most `N`
/// elements. The element count must be a nonzero multiple of `cols`.
pub fn read_i32_table<S: PropertySource + ?Sized, const N: usize>(
    src: &S,
    key: &str,
    cols: usize,
) -> Result<Vec<i32, N>, ConfigError> {
    let mut buf = [0i32; N];
    let len = src.read_i32_array(key, &mut buf)?;
    if len == 0 || cols == 0 || len % cols != 0 {
        error!("{} invalid length {}", key, len);
        return Err(ConfigError::Malformed);
    }

    Vec::from_slice(&buf[..len]).map_err(|_| ConfigError::TooLong)
}

/// String flavour of [`read_i32_table`].
pub fn read_str_table<'a, S: PropertySource + ?Sized, const N: usize>(
    src: &'a S,
    key: &str,
    cols: usize,
) -> Result<Vec<&'a str, N>, ConfigError> {
    let mut buf: [&'a str; N] = [""; N];
    let len = src.read_str_array(key, &mut buf)?;
    if len == 0 || cols == 0 || len % cols != 0 {
        error!("{} invalid length {}", key, len);
        return Err(ConfigError::Malformed);
    }

    Vec::from_slice(&buf[..len]).map_err(|_| ConfigError::TooLong)
}

pub fn parse_i32(s: &str) -> Result<i32, ConfigError> {
    s.trim().parse::<i32>().map_err(|_| ConfigError::Malformed)
}
