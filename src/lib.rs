// Alder Maps
// In-memory road-network routing and raster tile selection core.

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::let_and_return,
    clippy::cmp_owned,
    clippy::op_ref
)]

pub mod config;
pub mod pathfinding;
pub mod raster;
pub mod street_graph;


pub use config::RasterConfig;
pub use pathfinding::{route, shortest_path};
pub use raster::{RasterQuery, RasterResult, Rasterer};
pub use street_graph::StreetGraph;
