pub mod archives;
pub mod config;
pub mod pipeline;
pub mod remote;
pub mod toolchain;
pub mod version;
