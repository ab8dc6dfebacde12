//! 内容分页模块
//!
//! 章节 → 内容块 → 测量 → 页面。

pub mod config;
pub mod fitter;
pub mod measure;
pub mod page;
pub mod progress;
pub mod segment;
pub mod split;

pub use config::{BLOCKQUOTE_CHUNK_LINES, DEFAULT_CONFIG_PATH, FittingConfig, LayoutMode, Padding, PaginationConfig, SAFETY_MARGIN};
pub use fitter::{MeasuredSegment, PageFitter, fit_content};
pub use measure::{MeasurementProvider, Measurer, estimate_segment_height};
pub use page::{FittedContent, FittedPage, references_on_page};
pub use progress::{Progress, ProgressCallback, ProgressPhase};
pub use segment::{ContentSegment, ContentSegmenter, SegmentType};
