//! Per working mode IC parameter tables and path to IC index resolution.

use heapless::Vec;

use crate::config::{read_bool_or, read_i32_table, read_str_table, ConfigError, PropertySource};

use super::ic_manager::IcManagerError;
use super::{ChargeMode, ChargePath, IcIndexList, CHARGE_IC_MAX_NUM};

// ic_index, path_index, max_ibat, ibat_sample_point, vbat_sample_point
pub const IC_PARA_COLS: usize = 5;
// mode name, ic para table key
pub const MODE_PARA_COLS: usize = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IcParaRow {
    pub ic_index: usize,
    /// physical path the IC sits on, negative when the IC is not wired to a path
    pub path_index: i32,
    pub max_ibat: i32,
    pub ibat_sample_point: i32,
    pub vbat_sample_point: i32,
}

impl IcParaRow {
    const fn on_path(&self, path: ChargePath) -> bool {
        self.path_index >= 0 && path.contains_index(self.path_index as usize)
    }
}

pub type IcParaRows = Vec<IcParaRow, CHARGE_IC_MAX_NUM>;

// used when no table is configured: a single IC on the main path
const DEFAULT_ROWS: [IcParaRow; 1] = [IcParaRow {
    ic_index: 0,
    path_index: 0,
    max_ibat: 0,
    ibat_sample_point: 0,
    vbat_sample_point: 0,
}];

#[derive(Clone, Debug, Default)]
pub struct IcModeConfig {
    para_flag: bool,
    modes: [Option<IcParaRows>; ChargeMode::COUNT],
    pub use_coul_ibat: bool,
    pub use_coul_vbat: bool,
    pub use_two_stage: bool,
}

impl IcModeConfig {
    /// Unconfigured board: every mode resolves to one IC on the main path.
    pub fn single_ic() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ChargeMode, rows: &[IcParaRow]) -> Self {
        let mut table = IcParaRows::new();
        for row in rows.iter().take(CHARGE_IC_MAX_NUM) {
            let _ = table.push(*row);
        }
        self.modes[mode.index()] = Some(table);
        self.para_flag = true;
        self
    }

    /// Reads `mode_para` and the per mode tables it names. Any table failure
    /// leaves the unconfigured single IC layout in place.
    pub fn parse<S: PropertySource + ?Sized>(src: &S) -> Self {
        let mut cfg = Self::default();
        match Self::parse_mode_tables(src) {
            Ok(modes) => {
                cfg.modes = modes;
                cfg.para_flag = true;
            }
            Err(err) => {
                error!("mode para parse failed {}", err);
                return cfg;
            }
        }

        cfg.use_coul_ibat = read_bool_or(src, "use_coul_ibat", false);
        cfg.use_coul_vbat = read_bool_or(src, "use_coul_vbat", false);
        cfg.use_two_stage = read_bool_or(src, "use_two_stage", false);
        cfg
    }

    fn parse_mode_tables<S: PropertySource + ?Sized>(
        src: &S,
    ) -> Result<[Option<IcParaRows>; ChargeMode::COUNT], ConfigError> {
        let mut modes: [Option<IcParaRows>; ChargeMode::COUNT] = Default::default();
        let mode_para: Vec<&str, { ChargeMode::COUNT * MODE_PARA_COLS }> =
            read_str_table(src, "mode_para", MODE_PARA_COLS)?;

        for pair in mode_para.chunks(MODE_PARA_COLS) {
            let (mode_name, table_key) = (pair[0], pair[1]);
            let Some(mode) = ChargeMode::ALL.iter().copied().find(|m| m.as_str() == mode_name) else {
                warn!("unknown ic mode {}", mode_name);
                continue;
            };

            let data: Vec<i32, { CHARGE_IC_MAX_NUM * IC_PARA_COLS }> =
                read_i32_table(src, table_key, IC_PARA_COLS)?;
            let mut rows = IcParaRows::new();
            for (i, r) in data.chunks(IC_PARA_COLS).enumerate() {
                if r[0] < 0 || r[0] as usize >= CHARGE_IC_MAX_NUM {
                    return Err(ConfigError::Malformed);
                }
                let row = IcParaRow {
                    ic_index: r[0] as usize,
                    path_index: r[1],
                    max_ibat: r[2],
                    ibat_sample_point: r[3],
                    vbat_sample_point: r[4],
                };
                info!("{}[{}]={} {} {} {} {}", table_key, i, r[0], r[1], r[2], r[3], r[4]);
                rows.push(row).map_err(|_| ConfigError::TooLong)?;
            }
            modes[mode.index()] = Some(rows);
        }

        Ok(modes)
    }

    pub fn mode_para(&self, mode: ChargeMode) -> Result<&[IcParaRow], IcManagerError> {
        if !self.para_flag {
            return Ok(&DEFAULT_ROWS);
        }

        match &self.modes[mode.index()] {
            Some(rows) => Ok(rows.as_slice()),
            None => {
                error!("mode {} is illegal", mode.as_str());
                Err(IcManagerError::ModeNotConfigured)
            }
        }
    }

    /// ICs wired to `path` for `mode`, in table order.
    pub fn ic_index(&self, mode: ChargeMode, path: ChargePath) -> Result<IcIndexList, IcManagerError> {
        if !path.is_valid() {
            error!("path {} is illegal", path.bits());
            return Err(IcManagerError::IllegalPath);
        }

        let mut list = IcIndexList::new();
        for row in self.mode_para(mode)?.iter().filter(|r| r.on_path(path)) {
            list.push(row.ic_index).map_err(|_| IcManagerError::IndexOverflow)?;
        }

        if list.is_empty() {
            return Err(IcManagerError::NoEligibleIc);
        }
        Ok(list)
    }

    /// One IC per battery current sampling point. Among the ICs sampling the
    /// same point, the first one on `path` wins, otherwise the last one listed.
    pub fn ic_index_for_ibat(&self, mode: ChargeMode, path: ChargePath) -> Result<IcIndexList, IcManagerError> {
        if !path.is_valid() {
            error!("path {} is illegal", path.bits());
            return Err(IcManagerError::IllegalPath);
        }

        let rows = self.mode_para(mode)?;
        let mut list = IcIndexList::new();
        for point in 0..rows.len() as i32 {
            let mut chosen = None;
            for row in rows.iter().filter(|r| r.ibat_sample_point == point) {
                chosen = Some(row.ic_index);
                if row.on_path(path) {
                    break;
                }
            }

            if let Some(index) = chosen {
                list.push(index).map_err(|_| IcManagerError::IndexOverflow)?;
            }
        }

        if list.is_empty() {
            return Err(IcManagerError::NoEligibleIc);
        }
        Ok(list)
    }

    /// Rated battery current of one IC, 0 when the table has no entry for it.
    pub fn ic_max_ibat(&self, mode: ChargeMode, index: usize) -> Result<i32, IcManagerError> {
        Ok(self
            .mode_para(mode)?
            .iter()
            .find(|r| r.ic_index == index)
            .map(|r| r.max_ibat)
            .unwrap_or(0))
    }
}
