use thiserror::Error;

/// I/O errors that can occur when reading tile stacks or writing outputs
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error reported by the operating system
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),
}

impl IoError {
    /// Build an `IoError` from a `std::io::Error`, keeping not-found distinct.
    pub fn from_std(err: std::io::Error, path: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path.to_string())
        } else {
            IoError::Io(format!("{}: {}", path, err))
        }
    }
}

/// Errors that can occur when parsing or encoding TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only uncompressed pages are supported)")]
    UnsupportedCompression(String),

    /// Pixel layout that cannot be represented as a grayscale plane
    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// The file contains no image pages
    #[error("TIFF file contains no pages")]
    NoPages,

    /// Requested page does not exist
    #[error("Page {page} out of range (stack has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },
}

/// Errors raised while registering and fusing a grid of tiles
#[derive(Debug, Clone, Error)]
pub enum StitchError {
    /// Number of tiles does not match the grid
    #[error("Grid expects {expected} tiles, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },

    /// Tiles in one grid must share dimensions
    #[error("Tile {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    TileSizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Grid dimensions are zero
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Overlap percentage outside [0, 100)
    #[error("Invalid tile overlap: {0}%")]
    InvalidOverlap(f64),

    /// Malformed tile configuration file
    #[error("Invalid tile configuration: {0}")]
    Layout(String),
}

/// Errors from the end-to-end split/stitch/assemble pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF decode or encode error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// Registration or fusion error
    #[error("Stitching error: {0}")]
    Stitch(#[from] StitchError),

    /// No tiles were configured
    #[error("Tile list is empty")]
    EmptyTileList,

    /// Tile stacks disagree on their number of slices
    #[error("Tile '{tile}' has {actual} slices, expected {expected}")]
    StackDepthMismatch {
        tile: String,
        expected: usize,
        actual: usize,
    },

    /// Slice index requested beyond the stack depth
    #[error("Slice {slice} out of range (1..={depth})")]
    SliceOutOfRange { slice: usize, depth: usize },

    /// A blocking worker task failed
    #[error("Worker task failed: {0}")]
    Join(String),

    /// Report serialization failed
    #[error("Failed to write run report: {0}")]
    Report(String),
}
