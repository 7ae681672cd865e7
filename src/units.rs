// unit conversion factors shared by the charge, compensation and protocol paths

pub const POWER_UV_PER_MV: i32 = 1000;
pub const POWER_MV_PER_V: i32 = 1000;
pub const POWER_UW_PER_MW: i32 = 1000;
pub const POWER_MA_PER_A: i32 = 1000;
