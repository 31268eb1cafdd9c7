// Raster tile selection: maps a query bounding box plus viewport size to the
// grid of pre-rendered tiles at the coarsest zoom level that still meets the
// requested resolution. Pure math over a RasterConfig; no tile I/O here.

use crate::config::RasterConfig;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A query box (upper-left / lower-right corners, degrees) plus the viewport
/// it will be drawn into (pixels).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RasterQuery {
    pub ul_lon: f64,
    pub ul_lat: f64,
    pub lr_lon: f64,
    pub lr_lat: f64,
    pub width: f64,
    pub height: f64,
}

/// What the front end stitches into an image. On a rejected query every
/// field is null and `query_success` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterResult {
    /// Row-major grid of tile identifiers covering the snapped extent.
    pub render_grid: Option<Vec<Vec<String>>>,
    pub raster_ul_lon: Option<f64>,
    pub raster_ul_lat: Option<f64>,
    pub raster_lr_lon: Option<f64>,
    pub raster_lr_lat: Option<f64>,
    pub depth: Option<u8>,
    pub query_success: bool,
}

impl RasterResult {
    fn failure() -> Self {
        Self {
            render_grid: None,
            raster_ul_lon: None,
            raster_ul_lat: None,
            raster_lr_lon: None,
            raster_lr_lat: None,
            depth: None,
            query_success: false,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum RasterQueryError {
    #[error(
        "degenerate query box: lower-right ({lr_lon}, {lr_lat}) is not below and right of upper-left ({ul_lon}, {ul_lat})"
    )]
    DegenerateBox {
        ul_lon: f64,
        ul_lat: f64,
        lr_lon: f64,
        lr_lat: f64,
    },
    #[error("query box does not intersect the root map extent")]
    OutOfBounds,
}

pub struct Rasterer {
    config: RasterConfig,
}

impl Rasterer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Resolve a query box to a tile grid. Malformed and fully out-of-bounds
    /// boxes come back as a failure result, never a panic.
    pub fn raster(&self, query: &RasterQuery) -> RasterResult {
        if let Err(e) = self.validate(query) {
            warn!("Rejecting raster query: {}", e);
            return RasterResult::failure();
        }

        let depth = self.depth_for(query);
        let (ul_col, ul_row, lr_col, lr_row) = self.corner_indices(query, depth);
        debug!(
            "Raster depth {} covering cols {}..={}, rows {}..={}",
            depth, ul_col, lr_col, ul_row, lr_row
        );

        let (ul_lon, ul_lat, lr_lon, lr_lat) =
            self.snapped_box(ul_col, ul_row, lr_col, lr_row, depth);

        RasterResult {
            render_grid: Some(self.render_grid(ul_col, ul_row, lr_col, lr_row, depth)),
            raster_ul_lon: Some(ul_lon),
            raster_ul_lat: Some(ul_lat),
            raster_lr_lon: Some(lr_lon),
            raster_lr_lat: Some(lr_lat),
            depth: Some(depth),
            query_success: true,
        }
    }

    fn validate(&self, q: &RasterQuery) -> Result<(), RasterQueryError> {
        if q.lr_lon <= q.ul_lon || q.lr_lat >= q.ul_lat {
            return Err(RasterQueryError::DegenerateBox {
                ul_lon: q.ul_lon,
                ul_lat: q.ul_lat,
                lr_lon: q.lr_lon,
                lr_lat: q.lr_lat,
            });
        }
        let c = &self.config;
        // Boxes that only touch the root edge share no pixels with it.
        if q.lr_lon <= c.root_ul_lon
            || q.ul_lon >= c.root_lr_lon
            || q.ul_lat <= c.root_lr_lat
            || q.lr_lat >= c.root_ul_lat
        {
            return Err(RasterQueryError::OutOfBounds);
        }
        Ok(())
    }

    /// Coarsest depth whose per-tile LonDPP is at least as fine as the
    /// query's, capped at the deepest rendered level.
    fn depth_for(&self, q: &RasterQuery) -> u8 {
        let required = (q.lr_lon - q.ul_lon) / q.width;
        let mut depth = 0u8;
        let mut lon_dpp = self.config.root_lon_dpp();
        while lon_dpp > required && depth < self.config.max_depth {
            depth += 1;
            lon_dpp /= 2.0;
        }
        depth
    }

    /// Column/row of the query's upper-left and lower-right corners on the
    /// 2^depth grid, clamped to the grid where the query spills past the
    /// root box.
    fn corner_indices(&self, q: &RasterQuery, depth: u8) -> (u32, u32, u32, u32) {
        let c = &self.config;
        let tiles = (1u32 << depth) as f64;
        let max_idx = (1u32 << depth) - 1;
        let tile_w = (c.root_lr_lon - c.root_ul_lon) / tiles;
        let tile_h = (c.root_ul_lat - c.root_lr_lat) / tiles;

        let ul_col = if q.ul_lon < c.root_ul_lon {
            0
        } else {
            (((q.ul_lon - c.root_ul_lon) / tile_w).floor() as u32).min(max_idx)
        };
        let ul_row = if q.ul_lat > c.root_ul_lat {
            0
        } else {
            (((c.root_ul_lat - q.ul_lat) / tile_h).floor() as u32).min(max_idx)
        };
        let lr_col = if q.lr_lon > c.root_lr_lon {
            max_idx
        } else {
            ((((q.lr_lon - c.root_ul_lon) / tile_w).ceil() as u32) - 1).min(max_idx)
        };
        let lr_row = if q.lr_lat < c.root_lr_lat {
            max_idx
        } else {
            ((((c.root_ul_lat - q.lr_lat) / tile_h).ceil() as u32) - 1).min(max_idx)
        };

        (ul_col, ul_row, lr_col, lr_row)
    }

    /// Geographic extent of the selected tile range, snapped to tile
    /// boundaries. Always covers the query box's overlap with the root.
    fn snapped_box(
        &self,
        ul_col: u32,
        ul_row: u32,
        lr_col: u32,
        lr_row: u32,
        depth: u8,
    ) -> (f64, f64, f64, f64) {
        let c = &self.config;
        let tiles = (1u32 << depth) as f64;
        let tile_w = (c.root_lr_lon - c.root_ul_lon) / tiles;
        let tile_h = (c.root_ul_lat - c.root_lr_lat) / tiles;

        (
            c.root_ul_lon + ul_col as f64 * tile_w,
            c.root_ul_lat - ul_row as f64 * tile_h,
            c.root_ul_lon + (lr_col + 1) as f64 * tile_w,
            c.root_ul_lat - (lr_row + 1) as f64 * tile_h,
        )
    }

    fn render_grid(
        &self,
        ul_col: u32,
        ul_row: u32,
        lr_col: u32,
        lr_row: u32,
        depth: u8,
    ) -> Vec<Vec<String>> {
        if depth == 0 {
            return vec![vec!["root".to_string()]];
        }
        (ul_row..=lr_row)
            .map(|row| (ul_col..=lr_col).map(|col| quadkey(row, col, depth)).collect())
            .collect()
    }
}

/// Quadkey for a tile: one base-4 digit per depth level, most significant
/// first, row bit high and column bit low. Distinct (row, col) pairs at a
/// depth never collide, and the address round-trips from the digits.
pub fn quadkey(row: u32, col: u32, depth: u8) -> String {
    let mut key = String::with_capacity(depth as usize);
    for level in (0..depth).rev() {
        let row_bit = (row >> level) & 1;
        let col_bit = (col >> level) & 1;
        key.push(char::from(b'0' + (row_bit * 2 + col_bit) as u8));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rasterer() -> Rasterer {
        Rasterer::new(RasterConfig::default())
    }

    fn full_root_query(width: f64, height: f64) -> RasterQuery {
        let c = RasterConfig::default();
        RasterQuery {
            ul_lon: c.root_ul_lon,
            ul_lat: c.root_ul_lat,
            lr_lon: c.root_lr_lon,
            lr_lat: c.root_lr_lat,
            width,
            height,
        }
    }

    #[test]
    fn test_full_root_at_tile_width_is_depth_zero() {
        let r = rasterer();
        let result = r.raster(&full_root_query(256.0, 256.0));

        assert!(result.query_success);
        assert_eq!(result.depth, Some(0));
        assert_eq!(result.render_grid, Some(vec![vec!["root".to_string()]]));
        assert_eq!(result.raster_ul_lon, Some(r.config().root_ul_lon));
        assert_eq!(result.raster_lr_lat, Some(r.config().root_lr_lat));
    }

    #[test]
    fn test_depth_resolution_never_coarser_than_requested() {
        let r = rasterer();
        for width in [256.0, 500.0, 1000.0, 2000.0, 5000.0] {
            let q = full_root_query(width, 512.0);
            let result = r.raster(&q);
            let depth = result.depth.unwrap();
            let required = (q.lr_lon - q.ul_lon) / q.width;
            let selected = r.config().root_lon_dpp() / f64::from(1u32 << depth);

            assert!(depth <= r.config().max_depth);
            if depth < r.config().max_depth {
                assert!(selected <= required);
            }
            if depth > 0 {
                // Coarsest sufficient level: one level up would not satisfy
                // the request.
                assert!(selected * 2.0 > required);
            }
        }
    }

    #[test]
    fn test_depth_caps_at_max() {
        let r = rasterer();
        // Absurdly fine request; resolution cannot be met, cap applies.
        let result = r.raster(&full_root_query(10_000_000.0, 512.0));
        assert_eq!(result.depth, Some(r.config().max_depth));
    }

    #[test]
    fn test_result_box_contains_query_box() {
        let r = rasterer();
        let c = RasterConfig::default();
        let q = RasterQuery {
            ul_lon: c.root_ul_lon + 0.01,
            ul_lat: c.root_ul_lat - 0.005,
            lr_lon: c.root_ul_lon + 0.03,
            lr_lat: c.root_ul_lat - 0.02,
            width: 800.0,
            height: 600.0,
        };
        let result = r.raster(&q);

        assert!(result.query_success);
        assert!(result.raster_ul_lon.unwrap() <= q.ul_lon);
        assert!(result.raster_ul_lat.unwrap() >= q.ul_lat);
        assert!(result.raster_lr_lon.unwrap() >= q.lr_lon);
        assert!(result.raster_lr_lat.unwrap() <= q.lr_lat);

        // Grid dimensions match the advertised index range.
        let grid = result.render_grid.unwrap();
        let depth = result.depth.unwrap();
        assert!(!grid.is_empty());
        for row in &grid {
            assert_eq!(row.len(), grid[0].len());
            for key in row {
                assert_eq!(key.len(), depth as usize);
            }
        }
    }

    #[test]
    fn test_query_spilling_past_root_is_clamped() {
        let r = rasterer();
        let c = RasterConfig::default();
        let q = RasterQuery {
            ul_lon: c.root_ul_lon - 1.0,
            ul_lat: c.root_ul_lat + 1.0,
            lr_lon: c.root_lr_lon + 1.0,
            lr_lat: c.root_lr_lat - 1.0,
            width: 1200.0,
            height: 900.0,
        };
        let result = r.raster(&q);

        assert!(result.query_success);
        // Snapped box never exceeds the root extent.
        assert_eq!(result.raster_ul_lon, Some(c.root_ul_lon));
        assert_eq!(result.raster_ul_lat, Some(c.root_ul_lat));
        assert_eq!(result.raster_lr_lon, Some(c.root_lr_lon));
        assert_eq!(result.raster_lr_lat, Some(c.root_lr_lat));

        let depth = result.depth.unwrap();
        let per_axis = 1usize << depth;
        let grid = result.render_grid.unwrap();
        assert_eq!(grid.len(), per_axis);
        assert_eq!(grid[0].len(), per_axis);
    }

    #[test]
    fn test_disjoint_and_degenerate_queries_fail() {
        let r = rasterer();
        let c = RasterConfig::default();

        // Entirely east of the root box.
        let disjoint = RasterQuery {
            ul_lon: c.root_lr_lon + 1.0,
            ul_lat: c.root_ul_lat,
            lr_lon: c.root_lr_lon + 2.0,
            lr_lat: c.root_lr_lat,
            width: 500.0,
            height: 500.0,
        };
        // Corners swapped.
        let degenerate = RasterQuery {
            ul_lon: c.root_lr_lon - 0.01,
            ul_lat: c.root_lr_lat + 0.01,
            lr_lon: c.root_ul_lon + 0.01,
            lr_lat: c.root_ul_lat - 0.01,
            width: 500.0,
            height: 500.0,
        };

        for q in [disjoint, degenerate] {
            let result = r.raster(&q);
            assert!(!result.query_success);
            assert_eq!(result.render_grid, None);
            assert_eq!(result.depth, None);
            assert_eq!(result.raster_ul_lon, None);
        }
    }

    #[test]
    fn test_validation_taxonomy() {
        let r = rasterer();
        let c = RasterConfig::default();

        let swapped = RasterQuery {
            ul_lon: 0.0,
            ul_lat: 0.0,
            lr_lon: -1.0,
            lr_lat: 1.0,
            width: 100.0,
            height: 100.0,
        };
        assert!(matches!(
            r.validate(&swapped),
            Err(RasterQueryError::DegenerateBox { .. })
        ));

        let outside = RasterQuery {
            ul_lon: c.root_ul_lon - 2.0,
            ul_lat: c.root_ul_lat,
            lr_lon: c.root_ul_lon - 1.0,
            lr_lat: c.root_lr_lat,
            width: 100.0,
            height: 100.0,
        };
        assert_eq!(r.validate(&outside), Err(RasterQueryError::OutOfBounds));
    }

    #[test]
    fn test_quadkeys_are_unique_per_depth() {
        for depth in [1u8, 2, 3, 4] {
            let per_axis = 1u32 << depth;
            let mut seen = std::collections::HashSet::new();
            for row in 0..per_axis {
                for col in 0..per_axis {
                    let key = quadkey(row, col, depth);
                    assert_eq!(key.len(), depth as usize);
                    assert!(key.chars().all(|ch| ('0'..='3').contains(&ch)));
                    assert!(seen.insert(key));
                }
            }
            assert_eq!(seen.len(), (per_axis * per_axis) as usize);
        }
    }

    #[test]
    fn test_quadkey_digits() {
        // depth 2, row 1, col 0: high level row bit 0 / col bit 0 -> '0',
        // low level row bit 1 / col bit 0 -> '2'.
        assert_eq!(quadkey(1, 0, 2), "02");
        assert_eq!(quadkey(0, 0, 3), "000");
        assert_eq!(quadkey(3, 3, 2), "33");
    }

    #[test]
    fn test_failure_wire_shape() {
        let json = serde_json::to_value(RasterResult::failure()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "render_grid": null,
                "raster_ul_lon": null,
                "raster_ul_lat": null,
                "raster_lr_lon": null,
                "raster_lr_lat": null,
                "depth": null,
                "query_success": false,
            })
        );
    }
}
