//! 内容分段
//!
//! 把章节片段切成有类型的原子块，是分页的最小单位。块不跨章节。

use scraper::{ElementRef, Html, Node};
use serde::{Deserialize, Serialize};

use crate::epub::book::Chapter;

/// 块类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentType {
    Paragraph,
    Heading,
    List,
    ListItem,
    Blockquote,
    Image,
    Figure,
    Code,
    Rule,
    Table,
}

/// 分页的原子单位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSegment {
    pub id: String,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    pub html_content: String,
    pub text_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
    #[serde(default)]
    pub keep_with_next: bool,
    /// 内联图片的data URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

impl ContentSegment {
    pub fn new(id: String, segment_type: SegmentType, html_content: String, text_content: String) -> Self {
        Self {
            id,
            segment_type,
            html_content,
            text_content,
            heading_level: None,
            keep_with_next: false,
            image_data: None,
        }
    }
}

/// 块级标签
const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "ul", "ol", "li", "dl", "table", "thead",
    "tbody", "tfoot", "tr", "figure", "figcaption", "section", "article", "aside", "header", "footer", "nav",
    "main", "div", "hr", "br",
];

/// 含有块级子元素时向下展开的容器
const CONTAINER_TAGS: &[&str] = &["section", "article", "aside", "header", "footer", "nav", "main", "div"];

fn is_block(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

/// 章节分段器
pub struct ContentSegmenter<'a> {
    chapter_id: &'a str,
    segments: Vec<ContentSegment>,
    /// 尚未成段的行内内容
    inline_html: String,
    inline_text: String,
    inline_has_element: bool,
}

impl<'a> ContentSegmenter<'a> {
    fn new(chapter_id: &'a str) -> Self {
        Self {
            chapter_id,
            segments: Vec::new(),
            inline_html: String::new(),
            inline_text: String::new(),
            inline_has_element: false,
        }
    }

    /// 对章节内容分段
    pub fn segment_chapter(chapter: &Chapter) -> Vec<ContentSegment> {
        Self::segment_html(&chapter.id, &chapter.html_content)
    }

    /// 对任意片段分段，段ID以`chapter_id`为前缀
    pub fn segment_html(chapter_id: &str, html: &str) -> Vec<ContentSegment> {
        let fragment = Html::parse_fragment(html);
        let mut segmenter = ContentSegmenter::new(chapter_id);
        segmenter.walk_children(fragment.root_element());
        segmenter.flush_inline();
        segmenter.segments
    }

    fn walk_children(&mut self, parent: ElementRef) {
        for child in parent.children() {
            match child.value() {
                Node::Text(text) => {
                    let text: &str = text;
                    self.inline_html.push_str(&html_escape::encode_text(text));
                    self.inline_text.push_str(text);
                }
                Node::Element(_) => {
                    if let Some(element) = ElementRef::wrap(child) {
                        self.visit_element(element);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_element(&mut self, element: ElementRef) {
        let name = element.value().name();

        if matches!(name, "img" | "svg") {
            self.flush_inline();
            self.push_image(element, SegmentType::Image);
            return;
        }

        if !is_block(name) {
            if has_block_descendant(element) {
                self.flush_inline();
                self.walk_children(element);
            } else {
                self.inline_html.push_str(&element.html());
                self.inline_text.push_str(&element_text(element));
                self.inline_has_element = true;
            }
            return;
        }

        self.flush_inline();
        match name {
            _ if CONTAINER_TAGS.contains(&name) && has_block_child(element) => self.walk_children(element),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let mut segment = self.segment_for(element, SegmentType::Heading);
                segment.heading_level = name[1..].parse().ok();
                segment.keep_with_next = true;
                self.segments.push(segment);
            }
            "p" if is_image_only(element) => self.push_image(element, SegmentType::Image),
            "figure" => self.push_image(element, SegmentType::Figure),
            "blockquote" => self.push_element(element, SegmentType::Blockquote),
            "pre" => self.push_element(element, SegmentType::Code),
            "ul" | "ol" | "dl" => self.push_element(element, SegmentType::List),
            "li" => self.push_element(element, SegmentType::ListItem),
            "table" | "thead" | "tbody" | "tfoot" | "tr" => self.push_element(element, SegmentType::Table),
            "hr" => self.push_element(element, SegmentType::Rule),
            _ => self.push_element(element, SegmentType::Paragraph),
        }
    }

    fn next_id(&self) -> String {
        format!("{}-seg-{}", self.chapter_id, self.segments.len())
    }

    fn segment_for(&self, element: ElementRef, segment_type: SegmentType) -> ContentSegment {
        let text = if segment_type == SegmentType::Code {
            element.text().collect::<String>()
        } else {
            collapse_whitespace(&element_text(element))
        };
        ContentSegment::new(self.next_id(), segment_type, element.html(), text)
    }

    fn push_element(&mut self, element: ElementRef, segment_type: SegmentType) {
        let segment = self.segment_for(element, segment_type);
        self.segments.push(segment);
    }

    fn push_image(&mut self, element: ElementRef, segment_type: SegmentType) {
        let mut segment = self.segment_for(element, segment_type);
        segment.image_data = first_data_uri(element);
        self.segments.push(segment);
    }

    /// 把累积的行内内容合成为一个段落
    fn flush_inline(&mut self) {
        let html = std::mem::take(&mut self.inline_html);
        let text = std::mem::take(&mut self.inline_text);
        let has_element = std::mem::replace(&mut self.inline_has_element, false);

        let text = collapse_whitespace(&text);
        if text.is_empty() && !has_element {
            return;
        }
        let segment = ContentSegment::new(
            self.next_id(),
            SegmentType::Paragraph,
            format!("<p>{}</p>", html.trim()),
            text,
        );
        self.segments.push(segment);
    }
}

fn has_block_child(element: ElementRef) -> bool {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .map(|child| child.value().name())
        .any(|name| (is_block(name) && name != "br") || matches!(name, "img" | "svg"))
}

fn has_block_descendant(element: ElementRef) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|el| is_block(el.value().name()) && el.value().name() != "br")
}

/// `<p>`中只有图片（允许空白）
fn is_image_only(element: ElementRef) -> bool {
    let mut has_image = false;
    for child in element.children() {
        match child.value() {
            Node::Text(text) if text.trim().is_empty() => {}
            Node::Element(el) if matches!(el.name(), "img" | "svg") => has_image = true,
            Node::Comment(_) => {}
            _ => return false,
        }
    }
    has_image
}

/// 第一个`data:`图片地址
fn first_data_uri(element: ElementRef) -> Option<String> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .flat_map(|el| {
            ["src", "href", "xlink:href"]
                .into_iter()
                .filter_map(move |attr| el.value().attr(attr))
        })
        .find(|value| value.starts_with("data:image/"))
        .map(str::to_string)
}

/// 各文本节点之间以空格分隔，避免相邻块的文字粘连
fn element_text(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
