pub mod epub;
pub mod format;
pub mod layout;

#[cfg(test)]
mod test_support;

// === 核心API重新导出 ===

/// 书籍解析入口
pub use epub::{ParseOptions, parse_book, parse_book_in_background, parse_book_with};

/// 分页入口
pub use layout::{FittingConfig, PaginationConfig, fit_content};

/// 错误处理
pub use epub::{EpubError, Result};

// === 数据结构 ===

/// 解析结果
pub use epub::{BookContent, BookMetadata, Chapter, Reference, TocEntry, TocSource};

/// 分页结果
pub use layout::{ContentSegment, FittedContent, FittedPage, SegmentType};

/// 进度报告
pub use layout::{Progress, ProgressCallback, ProgressPhase};

// === 宿主集成 ===

/// 已解析书籍的缓存
pub use epub::BookCache;

/// 按扩展名选择提取器
pub use format::{ContentExtractor, ExtractorRegistry};

/// 宿主提供的测量能力
pub use layout::MeasurementProvider;

// === 库信息 ===

/// PageForge库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// PageForge库的描述
pub const DESCRIPTION: &str = "EPUB结构解析与内容分页适配引擎";

// === 便捷函数 ===

/// 读取并解析EPUB文件
///
/// 这是 `parse_book` 的便捷包装函数。
///
/// # 参数
/// * `path` - EPUB文件路径
///
/// # 返回值
/// * `Result<BookContent>` - 解析后的书籍内容
///
/// # 示例
///
/// ```no_run
/// let book = pageforge::open("book.epub")?;
/// println!("章节数: {}", book.chapters.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<BookContent> {
    let data = std::fs::read(path)?;
    parse_book(data)
}
