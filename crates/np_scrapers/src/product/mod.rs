//! Price comparison lookups.

pub mod hotline;

pub use hotline::HotlineClient;
