pub mod access_log;
pub mod appointment;
pub mod artifact;
pub mod clinician;
pub mod enums;
pub mod finance;
pub mod patient;

pub use access_log::*;
pub use appointment::*;
pub use artifact::*;
pub use clinician::*;
pub use enums::*;
pub use finance::*;
pub use patient::*;
