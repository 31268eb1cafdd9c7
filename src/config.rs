use serde::Deserialize;

/// Process-wide raster parameters: the fixed root map extent, the tile pixel
/// size, and the deepest zoom level the tile set was rendered at. Built once
/// at startup and handed to [`crate::raster::Rasterer::new`]; queries never
/// change it.
#[derive(Debug, Deserialize, Clone)]
pub struct RasterConfig {
    pub root_ul_lon: f64,
    pub root_ul_lat: f64,
    pub root_lr_lon: f64,
    pub root_lr_lat: f64,
    /// Pixels per tile edge, identical at every depth.
    pub tile_size: u32,
    pub max_depth: u8,
}

impl Default for RasterConfig {
    fn default() -> Self {
        // The reference tile set: 256px tiles over the Berkeley extent,
        // rendered down to depth 7.
        Self {
            root_ul_lon: -122.2998046875,
            root_ul_lat: 37.892195547244356,
            root_lr_lon: -122.2119140625,
            root_lr_lat: 37.82280243352756,
            tile_size: 256,
            max_depth: 7,
        }
    }
}

impl RasterConfig {
    /// Longitude degrees per pixel of the single depth-0 tile. Each depth
    /// below halves this.
    pub fn root_lon_dpp(&self) -> f64 {
        (self.root_lr_lon - self.root_ul_lon) / self.tile_size as f64
    }
}
