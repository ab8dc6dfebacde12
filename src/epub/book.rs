//! 书籍解析流程
//!
//! 压缩包 → 容器 → 包文档 → 章节与目录 → 注释，结果为只读的[`BookContent`]。

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use crate::epub::archive::ArchiveReader;
use crate::epub::chapter::ChapterExtractor;
use crate::epub::container::resolve_package_path;
use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{BookMetadata, Opf};
use crate::epub::path;
use crate::epub::references::ReferenceExtractor;
use crate::epub::toc::{TocEntry, resolve_toc};
use crate::layout::progress::{ProgressCallback, ProgressPhase, ProgressReporter};

/// 章节
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// 清单项ID
    pub id: String,
    pub title: String,
    /// 清理后的正文片段，图片已内联
    pub html_content: String,
    /// 阅读顺序位置
    pub order: usize,
    /// 相对于OPF目录的路径
    pub href: String,
}

/// 脚注/尾注
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: String,
    pub marker: String,
    pub content: String,
    pub chapter_id: String,
}

/// 解析结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookContent {
    pub book_id: String,
    pub metadata: BookMetadata,
    pub chapters: Vec<Chapter>,
    pub references: Vec<Reference>,
    pub table_of_contents: Vec<TocEntry>,
}

impl BookContent {
    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|chapter| chapter.id == id)
    }

    /// 某章节内的注释
    pub fn references_for(&self, chapter_id: &str) -> Vec<&Reference> {
        self.references
            .iter()
            .filter(|reference| reference.chapter_id == chapter_id)
            .collect()
    }
}

/// 解析选项
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// 宿主指定的书籍ID，缺省时从包文档推导
    pub book_id: Option<String>,
}

/// 解析EPUB字节数据
pub fn parse_book(data: Vec<u8>) -> Result<BookContent> {
    parse_book_with(data, &ParseOptions::default(), None)
}

/// 带选项和进度回调的解析
///
/// # 错误
/// * `ArchiveCorrupt` - 压缩包无法打开或条目损坏
/// * `Structural` - 引导描述文件或包文档缺失、无法解析
pub fn parse_book_with(
    data: Vec<u8>,
    options: &ParseOptions,
    on_progress: Option<ProgressCallback<'_>>,
) -> Result<BookContent> {
    let mut progress = ProgressReporter::new(on_progress);
    progress.report(ProgressPhase::Parsing, 0, None);

    let mut archive = ArchiveReader::from_bytes(data)?;
    let opf_path = resolve_package_path(&mut archive)?;
    let opf_xml = archive
        .read_text(&opf_path)?
        .ok_or_else(|| EpubError::Structural(format!("包文档不存在(missing package document): {}", opf_path)))?;
    let opf = Opf::parse_xml(&opf_xml)?;
    let opf_dir = path::parent_dir(&opf_path);
    debug!(opf_path = %opf_path, version = %opf.version, spine = opf.spine.len(), "包文档已解析");
    progress.report(ProgressPhase::Parsing, 10, None);

    let entries = opf.spine.entries();
    let mut chapters = Vec::with_capacity(entries.len());
    {
        let mut extractor = ChapterExtractor::new(&mut archive, opf_dir);
        for (i, entry) in entries.iter().enumerate() {
            if let Some(chapter) = extractor.extract(entry)? {
                chapters.push(chapter);
            }
            progress.report_step(ProgressPhase::Parsing, (10, 90), i + 1, entries.len(), Some(&entry.id));
        }
    }

    let references = ReferenceExtractor::new().extract_all(&chapters);
    let (table_of_contents, toc_source) = resolve_toc(&mut archive, &opf, opf_dir, &chapters)?;

    let book_id = options
        .book_id
        .clone()
        .unwrap_or_else(|| derive_book_id(&opf.metadata, &opf_xml));

    info!(
        book_id = %book_id,
        chapters = chapters.len(),
        skipped = entries.len() - chapters.len(),
        references = references.len(),
        toc_source = ?toc_source,
        "书籍解析完成"
    );
    progress.report(ProgressPhase::Parsing, 100, None);

    Ok(BookContent {
        book_id,
        metadata: opf.metadata,
        chapters,
        references,
        table_of_contents,
    })
}

/// 在后台线程中解析，解析过程本身仍是同步的
pub fn parse_book_in_background(data: Vec<u8>, options: ParseOptions) -> JoinHandle<Result<BookContent>> {
    thread::spawn(move || parse_book_with(data, &options, None))
}

/// 第一个标识符；没有时取标题（或包文档）的SHA-256前缀
fn derive_book_id(metadata: &BookMetadata, opf_xml: &str) -> String {
    if let Some(identifier) = metadata.identifiers.first() {
        return identifier.value.clone();
    }
    let seed = metadata.title.as_deref().unwrap_or(opf_xml);
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
    format!("book-{}", &digest[..16])
}
