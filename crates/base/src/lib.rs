pub mod log;
pub use self::log::*;

mod vec2;
pub use vec2::*;
