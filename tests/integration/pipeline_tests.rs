//! End-to-end pipeline tests.
//!
//! Tests verify:
//! - A full run writes split tiles, stitched slices, the final stack and a report
//! - The final stack has one page per stitched slice
//! - `max_slices` caps the run
//! - Depth mismatches between stacks abort before stitching

use stack_stitcher::io::LocalFileReader;
use stack_stitcher::pipeline::{
    Pipeline, PipelineOptions, ProjectLayout, REGISTERED_CONFIGURATION_FILE,
};
use stack_stitcher::{
    GridLayout, GridOrder, GridType, PipelineError, StitchParams, TiffStack, TiffWriter,
    TileConfiguration,
};

use super::test_utils::GridStacks;

fn options(layout: &ProjectLayout, tiles: Vec<String>) -> PipelineOptions {
    let grid = GridLayout::new(2, 2, GridType::ColumnByColumn, GridOrder::DownRight).unwrap();
    let mut stitch = StitchParams::new(grid);
    stitch.overlap_percent = 20.0;
    PipelineOptions::new(layout.clone(), tiles, stitch)
}

#[tokio::test]
async fn test_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path());
    let grid = GridStacks::jittered(3);
    let tiles = grid.write(&layout.input_dir()).await;

    let report = Pipeline::new(options(&layout, tiles)).run().await.unwrap();

    assert_eq!(report.depth, 3);
    assert_eq!(report.slices_stitched, 3);
    assert_eq!((report.width, report.height), (116, 89));
    assert_eq!(report.slices.len(), 3);
    for slice in &report.slices {
        assert_eq!(slice.summary.links_removed, 0);
        let (x, y) = slice.positions[3];
        assert!(
            (x - 52.0).abs() < 1e-6 && (y - 39.0).abs() < 1e-6,
            "slice {}: {:?}",
            slice.slice,
            (x, y)
        );
    }

    // Split files and layouts
    for slice in 1..=3 {
        for tile in 1..=4 {
            assert!(layout.split_tile_path(slice, tile).is_file());
        }
        let text = std::fs::read_to_string(layout.tile_configuration_path(slice)).unwrap();
        let config: TileConfiguration = text.parse().unwrap();
        assert_eq!(config.entries.len(), 4);
        assert_eq!(config.entries[2].file, format!("tile_{}_3.tif", slice));
        assert!(layout.slice_dir(slice).join(REGISTERED_CONFIGURATION_FILE).is_file());
        assert!(layout.stitched_path(slice).is_file());
    }

    // Final stack: one page per slice, each slice matches its scene
    let reader = LocalFileReader::open(layout.final_stack_path()).await.unwrap();
    let stack = TiffStack::open(reader).await.unwrap();
    assert_eq!(stack.page_count(), 3);
    assert_eq!(stack.dimensions(), (116, 89));
    for z in 0..3 {
        let page = stack.read_page(z).await.unwrap();
        let expected = grid.scenes[z].get(61, 20);
        assert!((page.get(60, 20) - expected).abs() < 1.0);
    }

    // Report on disk
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(layout.report_path()).unwrap()).unwrap();
    assert_eq!(json["slices_stitched"], 3);
    assert_eq!(json["parameters"]["fusion"], "linear-blending");
    assert_eq!(json["tiles"][0]["file"], "tile1_1.tif");
    assert_eq!(json["slices"][0]["links"].as_array().unwrap().len(), 4);

    // Timing summary
    let timings = &report.timings;
    assert_eq!(timings.slices, 3);
    assert_eq!(timings.average(), timings.total / 3);
    assert!(timings.per_slice.iter().sum::<std::time::Duration>() <= timings.total);
    assert!(timings.summary_lines()[0].starts_with("Total time taken: "));
}

#[tokio::test]
async fn test_max_slices_caps_run() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path());
    let tiles = GridStacks::jittered(4).write(&layout.input_dir()).await;

    let mut options = options(&layout, tiles);
    options.max_slices = Some(2);
    let report = Pipeline::new(options).run().await.unwrap();

    assert_eq!(report.depth, 4);
    assert_eq!(report.slices_stitched, 2);
    assert!(!layout.slice_dir(3).exists());
    assert!(!layout.stitched_path(3).exists());

    let reader = LocalFileReader::open(layout.final_stack_path()).await.unwrap();
    assert_eq!(TiffStack::open(reader).await.unwrap().page_count(), 2);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path());
    let tiles = GridStacks::jittered(1).write(&layout.input_dir()).await;

    let pipeline = Pipeline::new(options(&layout, tiles));
    let first = pipeline.run().await.unwrap();
    let second = pipeline.run().await.unwrap();
    assert_eq!(first.slices_stitched, second.slices_stitched);
    assert_eq!(first.slices[0].positions, second.slices[0].positions);
}

#[tokio::test]
async fn test_depth_mismatch_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path());
    let grid = GridStacks::jittered(3);
    let tiles = grid.write(&layout.input_dir()).await;

    // Overwrite the last tile with a shallower stack
    let mut short = grid.tile_stack(3);
    short.truncate(2);
    TiffWriter::new()
        .write_stack(&layout.input_path(&tiles[3]), &short)
        .await
        .unwrap();

    let err = Pipeline::new(options(&layout, tiles)).run().await.unwrap_err();
    match err {
        PipelineError::StackDepthMismatch {
            tile,
            expected,
            actual,
        } => {
            assert_eq!(tile, "tile1_4.tif");
            assert_eq!((expected, actual), (3, 2));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!layout.final_stack_path().exists());
}

#[tokio::test]
async fn test_missing_input_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path());
    let tiles = vec!["a.tif", "b.tif", "c.tif", "d.tif"]
        .into_iter()
        .map(String::from)
        .collect();

    let result = Pipeline::new(options(&layout, tiles)).run().await;
    assert!(matches!(
        result,
        Err(PipelineError::Io(stack_stitcher::IoError::NotFound(_)))
    ));
    // Directories are still created
    assert!(layout.input_dir().is_dir());
    assert!(layout.final_stack_dir().is_dir());
}
