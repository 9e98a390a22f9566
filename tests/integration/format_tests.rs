//! Format-specific integration tests.
//!
//! Tests verify:
//! - TIFF stacks are read in both byte orders and as BigTIFF
//! - Strip and tile layouts decode to the same plane
//! - Unsupported pages are rejected with typed errors
//! - Written stacks read back unchanged through the block cache

use stack_stitcher::error::TiffError;
use stack_stitcher::io::{BlockCache, LocalFileReader, MemoryReader};
use stack_stitcher::{imagej_description, PixelType, Plane, TiffStack, TiffWriter};

use super::test_utils::{is_tiff_magic, ByteOrderType, PageSpec, TiffBuilder, TrackingMockReader};

async fn open(data: Vec<u8>) -> Result<TiffStack<MemoryReader>, TiffError> {
    TiffStack::open(MemoryReader::new(data, "test.tif")).await
}

// =============================================================================
// Byte Order and BigTIFF
// =============================================================================

#[tokio::test]
async fn test_big_endian_stack() {
    let data = TiffBuilder::new(ByteOrderType::BigEndian)
        .page(PageSpec::gradient(6, 4, 16, 0.0))
        .page(PageSpec::gradient(6, 4, 16, 1000.0))
        .build();
    assert_eq!(&data[..2], b"MM");
    assert!(is_tiff_magic(&data));

    let stack = open(data).await.unwrap();
    assert_eq!(stack.page_count(), 2);
    assert_eq!(stack.dimensions(), (6, 4));
    assert_eq!(stack.pixel_type(), PixelType::U16);

    let page = stack.read_page(1).await.unwrap();
    assert_eq!(page.get(0, 0), 1000.0);
    assert_eq!(page.get(5, 3), 1023.0);
}

#[tokio::test]
async fn test_bigtiff_stack() {
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let data = TiffBuilder::new(order)
            .bigtiff()
            .page(PageSpec::gradient(5, 3, 8, 0.0))
            .page(PageSpec::gradient(5, 3, 8, 100.0))
            .page(PageSpec::gradient(5, 3, 8, 200.0))
            .build();

        let stack = open(data).await.unwrap();
        assert!(stack.header().is_bigtiff);
        assert_eq!(stack.page_count(), 3);
        let page = stack.read_page(2).await.unwrap();
        assert_eq!(page.get(4, 2), 214.0);
        assert_eq!(page.pixel_type(), PixelType::U8);
    }
}

#[tokio::test]
async fn test_float_pages() {
    let samples = vec![-1.5, 0.25, 3.0e4, 7.0];
    let data = TiffBuilder::new(ByteOrderType::BigEndian)
        .page(PageSpec::gray(2, 2, 32, samples).float())
        .build();

    let stack = open(data).await.unwrap();
    assert_eq!(stack.pixel_type(), PixelType::F32);
    let page = stack.read_page(0).await.unwrap();
    assert_eq!(page.samples(), &[-1.5, 0.25, 3.0e4, 7.0]);
}

// =============================================================================
// Strip and Tile Layouts
// =============================================================================

#[tokio::test]
async fn test_multi_strip_and_tiled_pages_agree() {
    let reference = PageSpec::gradient(20, 13, 16, 5.0);
    let single = open(
        TiffBuilder::new(ByteOrderType::LittleEndian)
            .page(reference.clone())
            .build(),
    )
    .await
    .unwrap();
    let strips = open(
        TiffBuilder::new(ByteOrderType::BigEndian)
            .page(reference.clone().with_strips(4))
            .build(),
    )
    .await
    .unwrap();
    // Partial tiles on the right and bottom edges
    let tiles = open(
        TiffBuilder::new(ByteOrderType::LittleEndian)
            .page(reference.with_tiles(16, 8))
            .build(),
    )
    .await
    .unwrap();

    let expected = single.read_page(0).await.unwrap();
    assert_eq!(strips.read_page(0).await.unwrap(), expected);
    assert_eq!(tiles.read_page(0).await.unwrap(), expected);
    assert_eq!(expected.get(19, 12), (12 * 20 + 19 + 5) as f32);
}

#[tokio::test]
async fn test_min_is_white_is_inverted() {
    let mut page = PageSpec::gray(2, 1, 8, vec![0.0, 200.0]);
    page.photometric = 0;
    let stack = open(TiffBuilder::new(ByteOrderType::LittleEndian).page(page).build())
        .await
        .unwrap();
    let plane = stack.read_page(0).await.unwrap();
    assert_eq!(plane.samples(), &[255.0, 55.0]);
}

#[tokio::test]
async fn test_reduced_resolution_pages_skipped() {
    let mut thumbnail = PageSpec::gradient(3, 2, 16, 0.0);
    thumbnail.new_subfile_type = 1;
    let data = TiffBuilder::new(ByteOrderType::LittleEndian)
        .page(PageSpec::gradient(6, 4, 16, 0.0))
        .page(thumbnail)
        .page(PageSpec::gradient(6, 4, 16, 50.0))
        .build();

    let stack = open(data).await.unwrap();
    assert_eq!(stack.page_count(), 2);
    assert_eq!(stack.pages()[1].ifd_index, 2);
    assert_eq!(stack.read_page(1).await.unwrap().get(0, 0), 50.0);
}

// =============================================================================
// Rejected Pages
// =============================================================================

#[tokio::test]
async fn test_compressed_page_rejected() {
    let mut page = PageSpec::gradient(4, 4, 8, 0.0);
    page.compression = 5;
    let result = open(TiffBuilder::new(ByteOrderType::LittleEndian).page(page).build()).await;
    assert!(matches!(result, Err(TiffError::UnsupportedCompression(_))));
}

#[tokio::test]
async fn test_rgb_page_rejected() {
    let mut page = PageSpec::gradient(4, 4, 8, 0.0);
    page.samples_per_pixel = 3;
    let result = open(TiffBuilder::new(ByteOrderType::LittleEndian).page(page).build()).await;
    assert!(matches!(result, Err(TiffError::UnsupportedPixelFormat(_))));
}

#[tokio::test]
async fn test_inconsistent_pages_rejected() {
    let data = TiffBuilder::new(ByteOrderType::LittleEndian)
        .page(PageSpec::gradient(6, 4, 16, 0.0))
        .page(PageSpec::gradient(6, 5, 16, 0.0))
        .build();
    assert!(open(data).await.is_err());

    let data = TiffBuilder::new(ByteOrderType::LittleEndian)
        .page(PageSpec::gradient(6, 4, 16, 0.0))
        .page(PageSpec::gradient(6, 4, 8, 0.0))
        .build();
    assert!(matches!(
        open(data).await,
        Err(TiffError::UnsupportedPixelFormat(_))
    ));
}

#[tokio::test]
async fn test_not_a_tiff() {
    assert!(matches!(
        open(b"GIF89a\x00\x00\x00\x00".to_vec()).await,
        Err(TiffError::InvalidMagic(_))
    ));
    assert!(matches!(
        open(b"II".to_vec()).await,
        Err(TiffError::FileTooSmall { .. })
    ));
}

#[tokio::test]
async fn test_page_out_of_range() {
    let stack = open(
        TiffBuilder::new(ByteOrderType::LittleEndian)
            .page(PageSpec::gradient(2, 2, 8, 0.0))
            .build(),
    )
    .await
    .unwrap();
    assert!(matches!(
        stack.read_page(1).await,
        Err(TiffError::PageOutOfRange { page: 1, count: 1 })
    ));
}

// =============================================================================
// Writer Round Trips
// =============================================================================

#[tokio::test]
async fn test_written_stack_reads_back_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.tif");

    let pages: Vec<Plane> = (0..5)
        .map(|z| {
            let samples = (0..40 * 30).map(|i| ((i * 3 + z * 11) % 65536) as f32).collect();
            Plane::from_samples(40, 30, PixelType::U16, samples).unwrap()
        })
        .collect();
    TiffWriter::new().write_stack(&path, &pages).await.unwrap();

    let reader = LocalFileReader::open(&path).await.unwrap();
    let stack = TiffStack::open(BlockCache::new(reader)).await.unwrap();
    assert_eq!(stack.page_count(), 5);
    assert_eq!(stack.description(), Some(imagej_description(5).as_str()));
    for (z, expected) in pages.iter().enumerate() {
        assert_eq!(&stack.read_page(z).await.unwrap(), expected);
    }
}

#[tokio::test]
async fn test_block_cache_coalesces_ifd_reads() {
    let pages: Vec<Plane> = (0..20).map(|_| Plane::new(16, 16, PixelType::U8)).collect();
    let data = TiffWriter::new().encode_stack(&pages).unwrap();

    let direct = TrackingMockReader::new(data.clone(), "direct");
    TiffStack::open(direct.clone()).await.unwrap();

    let tracked = TrackingMockReader::new(data, "cached");
    let stack = TiffStack::open(BlockCache::new(tracked.clone())).await.unwrap();
    assert_eq!(stack.page_count(), 20);

    // Whole file fits in one 64KB block
    assert_eq!(tracked.request_count(), 1);
    assert!(direct.request_count() > 20);
    assert_eq!(tracked.get_requests().await, vec![(0, tracked_len(&stack))]);
}

fn tracked_len(stack: &TiffStack<BlockCache<TrackingMockReader>>) -> usize {
    use stack_stitcher::io::RangeReader;
    stack.reader().size() as usize
}
