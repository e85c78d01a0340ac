pub mod atlas;
pub mod config;
pub mod data;
pub mod error;
pub mod hit_test;
pub mod lookup;
pub mod map_view;
pub mod render;
pub mod selection;
pub mod server;
pub mod types;
