pub mod config;
pub mod duration;
pub mod error;
pub mod fbs;
pub mod types;

pub use error::{Cdoc2Error, Cdoc2Result};
