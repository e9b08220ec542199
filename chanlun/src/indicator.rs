pub mod atr;
pub mod core;
pub mod volume_ma;

pub use self::atr::{Atr, true_range};
pub use self::core::{Indicator, RollingMean};
pub use self::volume_ma::VolumeMa;
