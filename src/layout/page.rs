//! 分页结果

use serde::{Deserialize, Serialize};

use crate::epub::book::Reference;
use crate::layout::config::FittingConfig;
use crate::layout::segment::ContentSegment;

/// 一页
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FittedPage {
    pub page_index: usize,
    pub chapter_id: String,
    pub chapter_title: String,
    pub segments: Vec<ContentSegment>,
    pub html_content: String,
    /// 页面内容中出现的注释
    pub references: Vec<Reference>,
    pub measured_height: f32,
    pub available_height: f32,
    /// 拆分后仍放不下的内容，属于可接受的降级
    pub overflow: bool,
}

/// 全书分页结果，页码从0开始连续
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FittedContent {
    pub pages: Vec<FittedPage>,
    pub total_pages: usize,
    pub fitting_config: FittingConfig,
}

impl FittedContent {
    pub fn page(&self, index: usize) -> Option<&FittedPage> {
        self.pages.get(index)
    }

    /// 某章节的所有页
    pub fn pages_for_chapter<'a>(&'a self, chapter_id: &'a str) -> impl Iterator<Item = &'a FittedPage> + 'a {
        self.pages.iter().filter(move |page| page.chapter_id == chapter_id)
    }

    /// 章节第一页的页码
    pub fn first_page_of(&self, chapter_id: &str) -> Option<usize> {
        self.pages
            .iter()
            .find(|page| page.chapter_id == chapter_id)
            .map(|page| page.page_index)
    }

    pub fn overflow_pages(&self) -> usize {
        self.pages.iter().filter(|page| page.overflow).count()
    }
}

/// 页面标记中出现的注释
///
/// 文本包含判断，不解析链接结构：注释ID出现在`id`属性或以`#id`结尾的链接中
/// （包括`c3.xhtml#fn1`这样的跨文件链接），
/// 或者出现由编号推导出的`#fnN`/`#noteN`/`#footnoteN`链接。
pub fn references_on_page(html: &str, references: &[&Reference]) -> Vec<Reference> {
    references
        .iter()
        .filter(|reference| mentions_reference(html, reference))
        .map(|reference| (*reference).clone())
        .collect()
}

fn mentions_reference(html: &str, reference: &Reference) -> bool {
    let mut targets = vec![reference.id.clone()];
    if let Some(number) = reference_number(reference) {
        targets.extend(["fn", "note", "footnote"].iter().map(|prefix| format!("{}{}", prefix, number)));
    }

    targets.iter().any(|target| {
        [
            format!("id=\"{}\"", target),
            format!("id='{}'", target),
            format!("#{}\"", target),
            format!("#{}'", target),
        ]
        .iter()
        .any(|pattern| html.contains(pattern.as_str()))
    })
}

/// 注释编号：ID中的数字，否则取标记中的数字
fn reference_number(reference: &Reference) -> Option<u32> {
    [reference.id.as_str(), reference.marker.as_str()].iter().find_map(|text| {
        let digits: String = text
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    })
}
