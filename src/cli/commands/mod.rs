pub mod backup;
pub mod bundle;
pub mod clean;
pub mod config;
pub mod init;
pub mod list;
pub mod stats;
pub mod sweep;
pub mod sync;
