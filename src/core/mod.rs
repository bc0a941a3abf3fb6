pub mod backup;
pub mod bundle;
pub mod clean;
pub mod lock;
pub mod manifest;
pub mod sync;
pub mod transport;
