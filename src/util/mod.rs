pub mod adf;
pub mod fsync;
