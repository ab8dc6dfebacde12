//! 脚注/尾注提取
//!
//! 没有固定的标记规范，只能根据`id`、`class`和`epub:type`中的关键词判断。

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::epub::book::{Chapter, Reference};

/// 判断为注释的关键词（不区分大小写的子串匹配）
const NOTE_KEYWORDS: &[&str] = &["footnote", "endnote", "note", "fn"];

/// 正文开头的注释标记：`[3]`、`(3)`、`*`、`†`、`[a]`、`a)`、`3.`
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\[\d+\]|\(\d+\)|\[[A-Za-z]\]|\([A-Za-z]\)|[*†‡§¶]+|\d+[.)]|[A-Za-z]\))").unwrap()
});

/// 跨章节计数的注释提取器
#[derive(Debug, Default)]
pub struct ReferenceExtractor {
    found: usize,
}

impl ReferenceExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按章节顺序、文档顺序提取所有注释
    pub fn extract_all(&mut self, chapters: &[Chapter]) -> Vec<Reference> {
        chapters.iter().flat_map(|chapter| self.extract(chapter)).collect()
    }

    /// 提取单个章节中的注释
    pub fn extract(&mut self, chapter: &Chapter) -> Vec<Reference> {
        let fragment = Html::parse_fragment(&chapter.html_content);
        let mut references = Vec::new();
        for child in fragment.root_element().children().filter_map(ElementRef::wrap) {
            self.visit(child, chapter, &mut references);
        }
        if !references.is_empty() {
            debug!(chapter_id = %chapter.id, count = references.len(), "发现注释");
        }
        references
    }

    fn visit(&mut self, element: ElementRef, chapter: &Chapter, out: &mut Vec<Reference>) {
        if is_note_candidate(element) && !is_note_collection(element) {
            self.found += 1;
            out.push(self.build(element, chapter));
            // 已接受的注释内部不再查找
            return;
        }
        for child in element.children().filter_map(ElementRef::wrap) {
            self.visit(child, chapter, out);
        }
    }

    fn build(&self, element: ElementRef, chapter: &Chapter) -> Reference {
        let text: String = element.text().collect();
        let marker = MARKER_RE
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| format!("[{}]", self.found));

        Reference {
            id: element
                .value()
                .attr("id")
                .map(str::to_string)
                .unwrap_or_else(|| format!("ref-{}", self.found)),
            marker,
            content: element.inner_html().trim().to_string(),
            chapter_id: chapter.id.clone(),
        }
    }
}

/// 用于判断的属性值：id、class以及任意前缀的type
fn classifying_attributes<'a>(element: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    element.value().attrs().filter_map(|(name, value)| {
        let local = name.rsplit(':').next().unwrap_or(name);
        matches!(local, "id" | "class" | "type").then_some(value)
    })
}

fn is_note_candidate(element: ElementRef) -> bool {
    // 指向注释的链接本身不是注释
    if element.value().name() == "a" && element.value().attr("href").is_some() {
        return false;
    }
    classifying_attributes(element).any(|value| {
        let value = value.to_lowercase();
        NOTE_KEYWORDS.iter().any(|keyword| value.contains(keyword))
    })
}

/// `footnotes`/`endnotes`这类容器：含有其他候选时向下查找
fn is_note_collection(element: ElementRef) -> bool {
    let plural = classifying_attributes(element).any(|value| value.to_lowercase().contains("notes"));
    plural
        && element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .any(is_note_candidate)
}
