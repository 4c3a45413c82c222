mod batch;
mod cli;
mod common;
mod config;
mod device;
mod filter;
mod image;
mod pipeline;
mod timing;
mod transfer;

pub mod prelude;

pub use prelude::*;
