mod client;
mod models;

pub use client::{DakaraApi, DakaraClient};
pub use models::*;
