//! Battery voltage compensation.
//!
//! Two independent corrections exist:
//! - the per-IC engine ([`CompEngine`]), computed once from the registered
//!   ICs, adds a leakage current offset or subtracts an IR drop;
//! - the board level table ([`VbatCompTable`]), a fixed `[main, aux]` offset
//!   per switch IC model, used only while the engine is inactive.

use heapless::{String, Vec};

use crate::config::{parse_i32, read_i32_table, read_str_table, read_u32_or, ConfigError, PropertySource};
use crate::units::POWER_UV_PER_MV;

use super::CHARGE_IC_MAX_NUM;

pub const IC_NAME_LEN_MAX: usize = 32;
pub type IcName = String<IC_NAME_LEN_MAX>;

pub const VBAT_COMP_BASE_PARA_MAX: usize = 20;
pub const VBAT_COMP_INDEX_PARA_MAX: usize = 5;
pub const VBAT_COMP_PARA_MAX: usize = 8;

// rounding bias applied before the uV -> mV division
const VBAT_COMP_BASE: i32 = 500;
const VBAT_COMP_INDEX_DEFAULT: i32 = -1;

pub const VBAT_COMP_IR: u32 = 1 << 0;
pub const VBAT_COMP_LEAK_CUR: u32 = 1 << 1;

// ic_name, leak_cur_p, leak_cur_n, comp_mode
const BASE_PARA_COLS: usize = 4;
// ic_index, p_index, n_index
const INDEX_PARA_COLS: usize = 3;
// ic_name, vbat_comp_main, vbat_comp_aux
const VBAT_COMP_COLS: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompError {
    /// no IC has been registered yet
    NotReady,
    Config(ConfigError),
}

impl From<ConfigError> for CompError {
    fn from(err: ConfigError) -> Self {
        CompError::Config(err)
    }
}

fn ic_name(s: &str) -> IcName {
    let mut name = IcName::new();
    for c in s.chars() {
        if name.push(c).is_err() {
            break;
        }
    }
    name
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeakagePara {
    pub ic_name: IcName,
    pub leak_cur_p: i32,
    pub leak_cur_n: i32,
    pub comp_mode: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplePointPara {
    pub ic_index: i32,
    pub p_index: i32,
    pub n_index: i32,
}

#[derive(Clone, Debug, Default)]
pub struct CompConfig {
    pub compensation_r: i32,
    pub leak_cur_r: i32,
    pub compensation_mode: u32,
    pub ic_para: Vec<LeakagePara, VBAT_COMP_BASE_PARA_MAX>,
    pub samp_para: Vec<SamplePointPara, VBAT_COMP_INDEX_PARA_MAX>,
}

impl CompConfig {
    /// Scalars default to 0 (no correction). Both tables are mandatory.
    pub fn parse<S: PropertySource + ?Sized>(src: &S) -> Result<Self, CompError> {
        let mut cfg = Self::default();

        let raw: Vec<&str, { VBAT_COMP_BASE_PARA_MAX * BASE_PARA_COLS }> =
            read_str_table(src, "vbat_comp_ic_para", BASE_PARA_COLS)?;
        for row in raw.chunks(BASE_PARA_COLS) {
            let para = LeakagePara {
                ic_name: ic_name(row[0]),
                leak_cur_p: parse_i32(row[1])?,
                leak_cur_n: parse_i32(row[2])?,
                comp_mode: parse_i32(row[3])? as u32,
            };
            info!("ic_name={},leak_cur_p={},leak_cur_n={}", para.ic_name.as_str(), para.leak_cur_p, para.leak_cur_n);
            cfg.ic_para.push(para).map_err(|_| ConfigError::TooLong)?;
        }

        let raw: Vec<i32, { VBAT_COMP_INDEX_PARA_MAX * INDEX_PARA_COLS }> =
            read_i32_table(src, "vbat_samp_point_para", INDEX_PARA_COLS)?;
        for row in raw.chunks(INDEX_PARA_COLS) {
            let para = SamplePointPara { ic_index: row[0], p_index: row[1], n_index: row[2] };
            info!("ic_index={},p_index={},n_index={}", para.ic_index, para.p_index, para.n_index);
            cfg.samp_para.push(para).map_err(|_| ConfigError::TooLong)?;
        }

        cfg.compensation_r = read_u32_or(src, "compensate_r", 0) as i32;
        cfg.leak_cur_r = read_u32_or(src, "leakage_r", 0) as i32;
        cfg.compensation_mode = read_u32_or(src, "compensation_mode", 0);
        Ok(cfg)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IcVbatComp {
    pub p_index: i32,
    pub n_index: i32,
    pub leak_cur_p: i32,
    pub leak_cur_n: i32,
    pub leak_cur_comp: i32,
    pub comp_mode: u32,
}

/// Per-IC compensation, fixed for the lifetime of the IC registration.
#[derive(Clone, Debug, Default)]
pub struct CompEngine {
    ic_vbat_comp: [IcVbatComp; CHARGE_IC_MAX_NUM],
    compensation_r: i32,
    compensation_mode: u32,
    finish_flag: bool,
}

impl CompEngine {
    /// Engine that never compensates.
    pub fn inactive() -> Self {
        Self::default()
    }

    /// `ic_names[i]` is the model name of the IC registered at slot `i`.
    pub fn build(config: &CompConfig, ic_names: [Option<&str>; CHARGE_IC_MAX_NUM]) -> Result<Self, CompError> {
        if ic_names.iter().all(|n| n.is_none()) {
            error!("no ic registered for vbat comp");
            return Err(CompError::NotReady);
        }

        let mut engine = Self {
            compensation_r: config.compensation_r,
            compensation_mode: config.compensation_mode,
            ..Default::default()
        };

        for (i, name) in ic_names.iter().enumerate() {
            let comp = &mut engine.ic_vbat_comp[i];
            let Some(name) = *name else {
                comp.p_index = VBAT_COMP_INDEX_DEFAULT;
                comp.n_index = VBAT_COMP_INDEX_DEFAULT;
                continue;
            };

            info!("ic[{}] name is {}", i, name);
            if let Some(samp) = config.samp_para.iter().find(|s| s.ic_index == i as i32) {
                comp.p_index = samp.p_index;
                comp.n_index = samp.n_index;
            }

            if let Some(para) = config.ic_para.iter().find(|p| name.contains(p.ic_name.as_str())) {
                comp.leak_cur_p = para.leak_cur_p;
                comp.leak_cur_n = para.leak_cur_n;
                comp.comp_mode = para.comp_mode;
            }
        }

        for i in 0..CHARGE_IC_MAX_NUM {
            let (p_index, n_index) = (engine.ic_vbat_comp[i].p_index, engine.ic_vbat_comp[i].n_index);
            let leak_cur_comp = leakage_comp(&engine.ic_vbat_comp, config.leak_cur_r, p_index, n_index);
            let comp = &mut engine.ic_vbat_comp[i];
            comp.leak_cur_comp = leak_cur_comp;
            info!(
                "[{}]p_index={},n_index={},leak_cur_p={},leak_cur_n={},leak_cur_comp={},comp_mode={}",
                i, comp.p_index, comp.n_index, comp.leak_cur_p, comp.leak_cur_n, comp.leak_cur_comp, comp.comp_mode
            );
        }

        engine.finish_flag = true;
        Ok(engine)
    }

    pub fn is_active(&self) -> bool {
        self.finish_flag
    }

    pub fn ic_comp(&self, role: usize) -> Option<&IcVbatComp> {
        self.ic_vbat_comp.get(role)
    }

    /// Voltage correction in mV for the IC at `role`. Leakage takes priority
    /// over IR drop. `ibat_now` is only sampled for IR compensation.
    pub fn ic_vbat_comp<F: FnOnce() -> i32>(&self, role: usize, ibat_now: F) -> i32 {
        if !self.finish_flag {
            return 0;
        }
        let Some(ic) = self.ic_vbat_comp.get(role) else {
            return 0;
        };

        let mode = self.compensation_mode & ic.comp_mode;
        let comp = if mode & VBAT_COMP_LEAK_CUR != 0 {
            ic.leak_cur_comp
        } else if mode & VBAT_COMP_IR != 0 {
            let ibat = ibat_now();
            if ibat > 0 {
                -(self.compensation_r * ibat / POWER_UV_PER_MV)
            } else {
                0
            }
        } else {
            0
        };

        info!("final vbat comp[{}]={}", role, comp);
        comp
    }
}

/// Leakage shared over the sampling points `p_index`/`n_index`, in mV.
fn leakage_comp(ics: &[IcVbatComp], leak_cur_r: i32, p_index: i32, n_index: i32) -> i32 {
    let mut leakage = 0;
    for ic in ics {
        if ic.p_index == p_index {
            leakage += ic.leak_cur_p;
        }
        if ic.n_index == n_index {
            leakage += ic.leak_cur_n;
        }
    }

    (leakage * leak_cur_r + VBAT_COMP_BASE) / POWER_UV_PER_MV
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VbatCompRow {
    pub ic_name: IcName,
    pub vbat_comp: [i32; 2],
}

/// Board level `[main, aux]` vbat offset per switch IC model.
#[derive(Clone, Debug, Default)]
pub struct VbatCompTable {
    rows: Vec<VbatCompRow, VBAT_COMP_PARA_MAX>,
}

impl VbatCompTable {
    /// Optional table. Rows parsed before a malformed entry are kept.
    pub fn parse<S: PropertySource + ?Sized>(src: &S) -> Self {
        let mut table = Self::default();
        let raw: Vec<&str, { VBAT_COMP_PARA_MAX * VBAT_COMP_COLS }> =
            match read_str_table(src, "vbat_comp_para", VBAT_COMP_COLS) {
                Ok(raw) => raw,
                Err(_) => return table,
            };

        for row in raw.chunks(VBAT_COMP_COLS) {
            let (Ok(main), Ok(aux)) = (parse_i32(row[1]), parse_i32(row[2])) else {
                error!("vbat_comp_para {} malformed", row[0]);
                break;
            };
            info!("ic_name={},vbat_comp_main={},vbat_comp_aux={}", row[0], main, aux);
            let _ = table.rows.push(VbatCompRow { ic_name: ic_name(row[0]), vbat_comp: [main, aux] });
        }
        table
    }

    pub fn from_rows(rows: &[VbatCompRow]) -> Self {
        let mut table = Self::default();
        for row in rows.iter().take(VBAT_COMP_PARA_MAX) {
            let _ = table.rows.push(row.clone());
        }
        table
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Offsets of the first row naming a substring of `ic_name`; falls back to
    /// row 0 for unknown ICs.
    pub fn lookup(&self, ic_name: &str) -> [i32; 2] {
        if let Some(row) = self.rows.iter().find(|r| ic_name.contains(r.ic_name.as_str())) {
            info!("ic_name={}, vbat_comp_main={}, vbat_comp_aux={}", row.ic_name.as_str(), row.vbat_comp[0], row.vbat_comp[1]);
            return row.vbat_comp;
        }

        match self.rows.first() {
            Some(row) => {
                warn!("ic_name={} is invalid, use {}", ic_name, row.ic_name.as_str());
                row.vbat_comp
            }
            None => [0, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PropertyTable, PropertyValue};

    fn leak_para(name: &str, p: i32, n: i32, mode: u32) -> LeakagePara {
        LeakagePara { ic_name: ic_name(name), leak_cur_p: p, leak_cur_n: n, comp_mode: mode }
    }

    #[test]
    fn shared_p_index_leakage_adds() {
        let mut cfg = CompConfig { leak_cur_r: 250, compensation_mode: VBAT_COMP_LEAK_CUR, ..Default::default() };
        cfg.ic_para.push(leak_para("sc8545", 5, 0, VBAT_COMP_LEAK_CUR)).unwrap();
        cfg.ic_para.push(leak_para("hl1512", 7, 0, VBAT_COMP_LEAK_CUR)).unwrap();
        cfg.samp_para.push(SamplePointPara { ic_index: 0, p_index: 0, n_index: 0 }).unwrap();
        cfg.samp_para.push(SamplePointPara { ic_index: 1, p_index: 0, n_index: 1 }).unwrap();

        let engine = CompEngine::build(&cfg, [Some("sc8545_sc"), Some("hl1512_sc")]).unwrap();
        // p leakage 5 + 7 on the shared point, n leakage 0 everywhere
        assert_eq!(engine.ic_comp(0).unwrap().leak_cur_comp, ((5 + 7) * 250 + 500) / 1000);
        assert_eq!(engine.ic_vbat_comp(0, || panic!("ibat not needed")), 3);
        assert!(engine.is_active());
    }

    #[test]
    fn ir_drop_subtracted_under_load() {
        let mut cfg = CompConfig { compensation_r: 20, compensation_mode: VBAT_COMP_IR, ..Default::default() };
        cfg.ic_para.push(leak_para("sc8545", 0, 0, VBAT_COMP_IR | VBAT_COMP_LEAK_CUR)).unwrap();

        let engine = CompEngine::build(&cfg, [Some("sc8545"), None]).unwrap();
        assert_eq!(engine.ic_vbat_comp(0, || 5000), -100);
        assert_eq!(engine.ic_vbat_comp(0, || -300), 0);
        // unregistered slot keeps the default sampling indices
        assert_eq!(engine.ic_comp(1).unwrap().p_index, -1);
        assert_eq!(engine.ic_vbat_comp(1, || 5000), 0);
        assert_eq!(engine.ic_vbat_comp(5, || 5000), 0);
    }

    #[test]
    fn inactive_engine() {
        let engine = CompEngine::inactive();
        assert!(!engine.is_active());
        assert_eq!(engine.ic_vbat_comp(0, || 5000), 0);
        assert_eq!(CompEngine::build(&CompConfig::default(), [None, None]).err(), Some(CompError::NotReady));
    }

    #[test]
    fn parse_requires_tables() {
        let props = PropertyTable::new(&[
            ("vbat_comp_ic_para", PropertyValue::StrArray(&["sc8545", "5", "0", "2"])),
            ("vbat_samp_point_para", PropertyValue::I32Array(&[0, 0, 0])),
            ("leakage_r", PropertyValue::U32(250)),
        ]);
        let cfg = CompConfig::parse(&props).unwrap();
        assert_eq!(cfg.leak_cur_r, 250);
        assert_eq!(cfg.compensation_r, 0);
        assert_eq!(cfg.ic_para[0].comp_mode, VBAT_COMP_LEAK_CUR);

        let props = PropertyTable::new(&[("vbat_comp_ic_para", PropertyValue::StrArray(&["sc8545", "x", "0", "2"]))]);
        assert_eq!(CompConfig::parse(&props).err(), Some(CompError::Config(ConfigError::Malformed)));

        assert_eq!(
            CompConfig::parse(&PropertyTable::EMPTY).err(),
            Some(CompError::Config(ConfigError::Missing))
        );
    }

    #[test]
    fn board_table_lookup() {
        let props = PropertyTable::new(&[(
            "vbat_comp_para",
            PropertyValue::StrArray(&["sc8545", "10", "20", "hl1512", "30", "40"]),
        )]);
        let table = VbatCompTable::parse(&props);
        assert_eq!(table.lookup("hl1512_sc"), [30, 40]);
        assert_eq!(table.lookup("unknown"), [10, 20]);
        assert_eq!(VbatCompTable::default().lookup("sc8545"), [0, 0]);
    }
}
