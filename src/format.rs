//! 按文件扩展名选择内容提取器

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::epub::book::{BookContent, ParseOptions, parse_book_with};
use crate::epub::error::Result;
use crate::epub::path;
use crate::layout::progress::ProgressCallback;

/// 内容提取器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentExtractor {
    Epub,
    /// 不支持的格式，产出空内容
    NoOp,
}

impl ContentExtractor {
    pub fn extract_content(
        &self,
        data: Vec<u8>,
        options: &ParseOptions,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<BookContent> {
        match self {
            ContentExtractor::Epub => parse_book_with(data, options, on_progress),
            ContentExtractor::NoOp => Ok(BookContent {
                book_id: options.book_id.clone().unwrap_or_default(),
                ..Default::default()
            }),
        }
    }
}

/// 扩展名（小写，不含点）到提取器的映射
#[derive(Debug, Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, ContentExtractor>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("epub", ContentExtractor::Epub);
        registry
    }
}

impl ExtractorRegistry {
    /// 不含任何映射的注册表
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    pub fn register(&mut self, extension: &str, extractor: ContentExtractor) {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        self.extractors.insert(key, extractor);
    }

    /// 未注册的扩展名返回[`ContentExtractor::NoOp`]
    pub fn for_extension(&self, extension: &str) -> ContentExtractor {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        self.extractors.get(&key).copied().unwrap_or(ContentExtractor::NoOp)
    }

    pub fn for_path(&self, file_path: &str) -> ContentExtractor {
        let extractor = path::extension(file_path)
            .map(|ext| self.for_extension(&ext))
            .unwrap_or(ContentExtractor::NoOp);
        if extractor == ContentExtractor::NoOp {
            warn!(path = %file_path, "没有对应的内容提取器");
        } else {
            debug!(path = %file_path, extractor = ?extractor, "选择内容提取器");
        }
        extractor
    }
}
