pub mod config;
pub mod error;
pub mod fetch;
pub mod gtfs;
pub mod naptan;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod scratch;
pub mod stats;
pub mod tiles;

pub use error::{Error, Result};
