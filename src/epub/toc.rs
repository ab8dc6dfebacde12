//! 目录（Table of Contents）模块
//!
//! 目录来源按以下顺序尝试，第一个非空结果生效：
//! 1. EPUB3导航文档
//! 2. 旧版NCX导航控制文件
//! 3. 按阅读顺序为每个章节生成`Section N`

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, warn};

use crate::epub::archive::ArchiveReader;
use crate::epub::book::Chapter;
use crate::epub::error::Result;
use crate::epub::nav::parse_nav_document;
use crate::epub::ncx::parse_ncx;
use crate::epub::opf::{ManifestItem, Opf};
use crate::epub::path;

/// 目录项，子项归父项所有
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    pub id: String,
    pub title: String,
    /// 相对于OPF目录的路径，可带片段
    pub href: String,
    /// 兄弟节点中的序号
    pub order: usize,
    /// 嵌套层级，顶层为0
    pub level: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

/// 目录的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocSource {
    Nav,
    Ncx,
    Generated,
}

impl TocEntry {
    /// 获取节点的最大深度（叶子节点为自身层级）
    pub fn max_depth(&self) -> usize {
        self.children
            .iter()
            .map(TocEntry::max_depth)
            .max()
            .unwrap_or(self.level)
    }

    /// 获取节点及其所有子节点的数量
    pub fn total_entries(&self) -> usize {
        1 + self.children.iter().map(TocEntry::total_entries).sum::<usize>()
    }

    /// 根据href查找节点（忽略片段）
    pub fn find_by_href(&self, href: &str) -> Option<&TocEntry> {
        if path::strip_fragment(&self.href) == path::strip_fragment(href) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_href(href))
    }

    /// 深度优先展开
    pub fn flatten<'a>(&'a self, out: &mut Vec<&'a TocEntry>) {
        out.push(self);
        for child in &self.children {
            child.flatten(out);
        }
    }

    /// 把href改写为相对OPF目录的路径，`base_dir`为目录文件所在目录
    fn rebase(&mut self, base_dir: &str, opf_dir: &str) {
        if !self.href.is_empty() {
            let full = path::resolve(base_dir, &self.href);
            let mut rebased = path::relative_to(opf_dir, &full);
            if let Some(frag) = path::fragment(&self.href) {
                rebased.push('#');
                rebased.push_str(frag);
            }
            self.href = rebased;
        }
        for child in &mut self.children {
            child.rebase(base_dir, opf_dir);
        }
    }
}

/// 目录树的树状文本表示（├── └──）
pub struct TocDisplay<'a>(pub &'a [TocEntry]);

impl Display for TocDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        fn render(entries: &[TocEntry], prefix: &str, f: &mut Formatter<'_>) -> FmtResult {
            for (i, entry) in entries.iter().enumerate() {
                let is_last = i + 1 == entries.len();
                let connector = if is_last { "└── " } else { "├── " };
                writeln!(f, "{}{}{} ({})", prefix, connector, entry.title, entry.href)?;
                let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
                render(&entry.children, &child_prefix, f)?;
            }
            Ok(())
        }
        render(self.0, "", f)
    }
}

/// 按后备顺序解析目录
pub fn resolve_toc(
    archive: &mut ArchiveReader,
    opf: &Opf,
    opf_dir: &str,
    chapters: &[Chapter],
) -> Result<(Vec<TocEntry>, TocSource)> {
    if let Some(item) = opf.nav_item() {
        let entries = load_toc(archive, item, opf_dir, parse_nav_document)?;
        if !entries.is_empty() {
            debug!(href = %item.href, count = entries.len(), "使用导航文档目录");
            return Ok((entries, TocSource::Nav));
        }
    }

    if let Some(item) = opf.ncx_item() {
        let entries = load_toc(archive, item, opf_dir, |content| {
            parse_ncx(content).unwrap_or_else(|e| {
                warn!(error = %e, "NCX文件无法解析");
                Vec::new()
            })
        })?;
        if !entries.is_empty() {
            debug!(href = %item.href, count = entries.len(), "使用NCX目录");
            return Ok((entries, TocSource::Ncx));
        }
    }

    debug!(count = chapters.len(), "没有可用的目录文件，按章节生成目录");
    Ok((generate_from_chapters(chapters), TocSource::Generated))
}

/// 读取并解析目录文件；文件缺失视为空目录
fn load_toc<F>(archive: &mut ArchiveReader, item: &ManifestItem, opf_dir: &str, parse: F) -> Result<Vec<TocEntry>>
where
    F: FnOnce(&str) -> Vec<TocEntry>,
{
    let full_path = path::resolve(opf_dir, &item.href);
    let Some(content) = archive.read_text(&full_path)? else {
        warn!(path = %full_path, "目录文件不存在");
        return Ok(Vec::new());
    };

    let mut entries = parse(&content);
    let base_dir = path::parent_dir(&full_path);
    for entry in &mut entries {
        entry.rebase(base_dir, opf_dir);
    }
    Ok(entries)
}

/// 为每个章节生成一个扁平目录项
pub fn generate_from_chapters(chapters: &[Chapter]) -> Vec<TocEntry> {
    chapters
        .iter()
        .enumerate()
        .map(|(i, chapter)| TocEntry {
            id: format!("section-{}", i + 1),
            title: format!("Section {}", i + 1),
            href: chapter.href.clone(),
            order: i,
            level: 0,
            children: Vec::new(),
        })
        .collect()
}
