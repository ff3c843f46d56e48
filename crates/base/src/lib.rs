pub mod log;
pub use self::log::*;

pub use ::log::LevelFilter;
