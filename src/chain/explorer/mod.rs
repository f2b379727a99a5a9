pub mod client;
pub mod model;

pub use client::ExplorerClient;
