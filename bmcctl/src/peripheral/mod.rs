pub mod pmbus;
pub mod psu;
pub mod psu_model;
