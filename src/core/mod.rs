//! Core runtime: the publish session and the capabilities it drives.

pub mod collector;
pub mod indicator;
pub mod lifecycle;
pub mod message;
pub mod probe;
pub mod sensors;
pub mod session;
