//! Stitching integration tests.
//!
//! Tests verify:
//! - Registration recovers jittered tile offsets on a 2x2 grid
//! - Links that disagree with the rest of the grid are discarded
//! - Every fusion method yields a composite covering the bounding box

use stack_stitcher::stitch::{LinkStatus, StitchSummary};
use stack_stitcher::{
    FusionMethod, GridLayout, GridOrder, GridStitcher, GridType, StitchParams, TileConfiguration,
};

use super::test_utils::{crop, scene, GridStacks};

fn params() -> StitchParams {
    let grid = GridLayout::new(2, 2, GridType::ColumnByColumn, GridOrder::DownRight).unwrap();
    let mut params = StitchParams::new(grid);
    params.overlap_percent = 20.0;
    params
}

fn slice_tiles(grid: &GridStacks, depth: usize) -> Vec<stack_stitcher::Plane> {
    (0..grid.origins.len())
        .map(|i| grid.tile_stack(i).swap_remove(depth))
        .collect()
}

#[test]
fn test_jittered_grid_registers_exactly() {
    let grid = GridStacks::jittered(1);
    let tiles = slice_tiles(&grid, 0);

    let result = GridStitcher::new(params()).stitch(&tiles).unwrap();

    let (x0, y0) = grid.origins[0];
    for (index, position) in result.positions.iter().enumerate() {
        let (ox, oy) = grid.origins[index];
        assert!(
            (position.0 - (ox as f64 - x0 as f64)).abs() < 1e-6
                && (position.1 - (oy as f64 - y0 as f64)).abs() < 1e-6,
            "tile {} at {:?}",
            index,
            position
        );
    }
    assert_eq!(result.summary.links_removed, 0);
    assert!(result.summary.max_error < 1e-6);

    // Composite equals the scene over the covered region
    let scene = &grid.scenes[0];
    let (min_x, min_y) = (1, 0);
    for &(x, y) in &[(10, 10), (60, 20), (30, 60), (100, 70)] {
        let fused = result.fused.get(x, y);
        let expected = scene.get(x + min_x, y + min_y);
        assert!((fused - expected).abs() < 0.5, "({}, {}): {} vs {}", x, y, fused, expected);
    }
}

#[test]
fn test_every_fusion_method_covers_bounding_box() {
    let grid = GridStacks::jittered(1);
    let tiles = slice_tiles(&grid, 0);

    for method in [
        FusionMethod::LinearBlending,
        FusionMethod::Average,
        FusionMethod::Max,
        FusionMethod::Min,
        FusionMethod::Overwrite,
    ] {
        let mut params = params();
        params.fusion = method;
        let result = GridStitcher::new(params).stitch(&tiles).unwrap();
        // x from 1 to 53 + 64, y from 0 to 41 + 48
        assert_eq!(result.fused.dimensions(), (116, 89), "{:?}", method);
        // Identical overlaps fuse to the same value whatever the method
        let expected = grid.scenes[0].get(55, 5);
        assert!((result.fused.get(54, 5) - expected).abs() < 0.5, "{:?}", method);
    }
}

#[test]
fn test_unrelated_tile_link_discarded() {
    let grid = GridStacks::jittered(1);
    let mut tiles = slice_tiles(&grid, 0);
    // Tile 3 shows another scene and cannot register
    tiles[3] = crop(&scene(128, 96, 99), 0, 0, 64, 48);

    // Genuine links correlate perfectly; chance matches stay far below this
    let mut params = params();
    params.optimize.regression_threshold = 0.9;
    let result = GridStitcher::new(params).stitch(&tiles).unwrap();

    for link in result.links.iter().filter(|l| l.to == 3) {
        assert_eq!(link.status, LinkStatus::BelowThreshold, "{:?}", link);
    }
    assert!(result
        .links
        .iter()
        .filter(|l| l.to != 3)
        .all(|l| l.status == LinkStatus::Kept));
    // Tile 3 keeps its layout position (0.8 * 64, 0.8 * 48)
    let (px, py) = result.positions[3];
    assert!((px - 51.2).abs() < 1e-6 && (py - 38.4).abs() < 1e-6);
}

#[test]
fn test_layout_only_stitch() {
    let grid = GridStacks::jittered(1);
    let tiles = slice_tiles(&grid, 0);
    let mut params = params();
    params.compute_overlap = false;

    let result = GridStitcher::new(params).stitch(&tiles).unwrap();
    assert!(result.links.is_empty());
    assert_eq!(result.summary, StitchSummary::default());

    let config = TileConfiguration::from_positions(
        &["a.tif", "b.tif", "c.tif", "d.tif"],
        &result.positions,
    );
    let text = config.to_text();
    assert!(text.contains("d.tif; ; (51.2, 38.4)"));
}
