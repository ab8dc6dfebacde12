pub mod archive;
pub mod book;
pub mod cache;
pub mod chapter;
pub mod container;
pub mod error;
pub mod nav;
pub mod ncx;
pub mod opf;
pub mod path;
pub mod references;
pub mod sanitize;
pub mod toc;

// 重新导出错误处理
pub use error::{EpubError, Result};

// 重新导出压缩包与容器相关
pub use archive::ArchiveReader;
pub use container::{Container, RootFile, resolve_package_path};

// 重新导出解析流程和数据结构
pub use book::{BookContent, Chapter, ParseOptions, Reference, parse_book, parse_book_in_background, parse_book_with};
pub use cache::{BookCache, DEFAULT_CACHE_CAPACITY};
pub use chapter::{ChapterExtractor, image_mime_type};
pub use references::ReferenceExtractor;

// 重新导出OPF相关
pub use opf::{BookMetadata, Creator, Identifier, ManifestItem, Metadata, Opf, SpineEntry, SpineItem};

// 重新导出目录相关
pub use nav::parse_nav_document;
pub use ncx::parse_ncx;
pub use toc::{TocDisplay, TocEntry, TocSource, resolve_toc};
