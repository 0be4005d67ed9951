#![deny(warnings)]

pub mod config;
pub mod emotion;
pub mod fusion;
pub mod ingest;
pub mod pipeline;
pub mod speech;
pub mod util;
pub mod voice;
