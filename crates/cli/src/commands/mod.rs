//! Command implementations.

mod fuse;
mod info;
mod run;
mod validate;

pub use fuse::run_fuse;
pub use info::run_info;
pub use run::run_mission;
pub use validate::run_validate;
