//! Leaf IC operation tables. Concrete chip drivers implement these traits and
//! are handed to the power path by reference.

pub mod charge_pump;
pub mod dc_ic;
