//! 章节提取
//!
//! 按阅读顺序读取每个章节文档，取出正文、推断标题、把图片内联为data URI。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::epub::archive::ArchiveReader;
use crate::epub::book::Chapter;
use crate::epub::error::Result;
use crate::epub::opf::SpineEntry;
use crate::epub::path;
use crate::epub::sanitize;

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// 标题候选，按优先级排列
static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["h1", "h2", "h3", "title"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

/// `<img ...>`以及SVG中的`<image ...>`，引号内的`>`不结束标签
static IMAGE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<(?:img|image)\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).unwrap());

/// 标签中带引号值的属性，按顺序逐个匹配，属性值中的文字不会被当作属性
static TAG_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\s([A-Za-z_:][\w:.-]*)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap());

/// 指向图片资源的属性名
fn is_image_ref_attr(name: &str) -> bool {
    ["src", "href", "xlink:href"].iter().any(|attr| name.eq_ignore_ascii_case(attr))
}

/// 根据扩展名推断图片MIME类型，未知扩展名按JPEG处理
pub fn image_mime_type(file_path: &str) -> &'static str {
    match path::extension(file_path).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}

/// 章节提取器，借用压缩包读取器
pub struct ChapterExtractor<'a> {
    archive: &'a mut ArchiveReader,
    opf_dir: &'a str,
}

impl<'a> ChapterExtractor<'a> {
    /// `opf_dir`为包文档所在目录，章节href相对于它
    pub fn new(archive: &'a mut ArchiveReader, opf_dir: &'a str) -> Self {
        Self { archive, opf_dir }
    }

    /// 提取一个章节
    ///
    /// # 返回值
    /// * `Ok(None)` - 章节文件不存在，已记录警告
    /// * `Err(ArchiveCorrupt)` - 条目损坏
    pub fn extract(&mut self, entry: &SpineEntry) -> Result<Option<Chapter>> {
        let full_path = path::resolve(self.opf_dir, &entry.href);
        let Some(raw) = self.archive.read_text(&full_path)? else {
            warn!(chapter_id = %entry.id, path = %full_path, "章节文件不存在，已跳过");
            return Ok(None);
        };

        let document = Html::parse_document(&sanitize::prepare_for_parsing(&raw));
        let title = extract_title(&document).unwrap_or_else(|| format!("Chapter {}", entry.order + 1));

        let body_html = document
            .select(&BODY_SELECTOR)
            .next()
            .map(|body| body.inner_html())
            .unwrap_or_else(|| document.root_element().inner_html());
        let cleaned = sanitize::sanitize_fragment(&body_html);
        let html_content = self.inline_images(&cleaned, path::parent_dir(&full_path))?;

        debug!(chapter_id = %entry.id, title = %title, bytes = html_content.len(), "章节已提取");
        Ok(Some(Chapter {
            id: entry.id.clone(),
            title,
            html_content,
            order: entry.order,
            href: entry.href.clone(),
        }))
    }

    /// 把片段中引用压缩包内图片的标签改写为data URI
    fn inline_images(&mut self, fragment: &str, chapter_dir: &str) -> Result<String> {
        let mut output = String::with_capacity(fragment.len());
        let mut last = 0;

        for tag in IMAGE_TAG_RE.find_iter(fragment) {
            output.push_str(&fragment[last..tag.start()]);
            output.push_str(&self.inline_tag(tag.as_str(), chapter_dir)?);
            last = tag.end();
        }
        output.push_str(&fragment[last..]);
        Ok(output)
    }

    fn inline_tag(&mut self, tag: &str, chapter_dir: &str) -> Result<String> {
        let mut output = String::with_capacity(tag.len());
        let mut last = 0;

        for caps in TAG_ATTR_RE.captures_iter(tag) {
            let Some(whole) = caps.get(0) else { continue };
            if !is_image_ref_attr(&caps[2]) {
                continue;
            }
            let value = caps.get(3).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
            let source = html_escape::decode_html_entities(value);

            if source.is_empty() || source.starts_with("data:") {
                continue;
            }

            let image_path = path::resolve(chapter_dir, &source);
            match self.archive.read_binary(&image_path)? {
                Some(bytes) => {
                    output.push_str(&tag[last..whole.start()]);
                    output.push_str(&caps[1]);
                    output.push_str(&format!(
                        "\"data:{};base64,{}\"",
                        image_mime_type(&image_path),
                        STANDARD.encode(&bytes)
                    ));
                    last = whole.end();
                }
                None => warn!(src = %source, path = %image_path, "图片不存在，保留原始引用"),
            }
        }
        output.push_str(&tag[last..]);
        Ok(output)
    }
}

/// 依次尝试h1、h2、h3和文档title
fn extract_title(document: &Html) -> Option<String> {
    TITLE_SELECTORS.iter().find_map(|selector| {
        document
            .select(selector)
            .map(|el| el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|text| !text.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{xhtml, zip_bytes};

    fn entry(href: &str, order: usize) -> SpineEntry {
        SpineEntry {
            id: format!("ch{}", order + 1),
            href: href.to_string(),
            order,
            linear: true,
        }
    }

    #[test]
    fn test_title_precedence() {
        let doc = Html::parse_document(&xhtml("Doc Title", "<h2>Second</h2><h1>  First\n Heading </h1>"));
        assert_eq!(extract_title(&doc).as_deref(), Some("First Heading"));

        let doc = Html::parse_document(&xhtml("Doc Title", "<p>no headings</p>"));
        assert_eq!(extract_title(&doc).as_deref(), Some("Doc Title"));

        let doc = Html::parse_document(&xhtml("", "<p>nothing</p>"));
        assert_eq!(extract_title(&doc), None);
    }

    #[test]
    fn test_fallback_title_uses_spine_position() {
        let chapter_xml = xhtml("", "<p>text</p>");
        let data = zip_bytes(&[("OEBPS/text/c.xhtml", chapter_xml.as_bytes())]);
        let mut archive = ArchiveReader::from_bytes(data).unwrap();
        let mut extractor = ChapterExtractor::new(&mut archive, "OEBPS");

        let chapter = extractor.extract(&entry("text/c.xhtml", 2)).unwrap().unwrap();
        assert_eq!(chapter.title, "Chapter 3");
        assert_eq!(chapter.html_content, "<p>text</p>");
        assert_eq!(chapter.href, "text/c.xhtml");
    }

    #[test]
    fn test_images_are_inlined() {
        let chapter_xml = xhtml(
            "Pics",
            r#"<p><img src="../images/cover.png" alt="c"/></p><p><img src="missing.jpg"/></p><p><img src="data:image/gif;base64,R0lG"/></p>"#,
        );
        let data = zip_bytes(&[
            ("OEBPS/text/c.xhtml", chapter_xml.as_bytes()),
            ("OEBPS/images/cover.png", b"\x89PNG"),
        ]);
        let mut archive = ArchiveReader::from_bytes(data).unwrap();
        let mut extractor = ChapterExtractor::new(&mut archive, "OEBPS");

        let chapter = extractor.extract(&entry("text/c.xhtml", 0)).unwrap().unwrap();
        assert!(chapter.html_content.contains(r#"src="data:image/png;base64,iVBORw==""#));
        assert!(chapter.html_content.contains(r#"src="missing.jpg""#));
        assert!(chapter.html_content.contains(r#"src="data:image/gif;base64,R0lG""#));
    }

    #[test]
    fn test_quoted_angle_bracket_does_not_end_image_tag() {
        let chapter_xml = xhtml(
            "Pics",
            r#"<p><img alt="x > y" src="images/cover.png"/></p><p><img alt='a src="b.png"' src="images/cover.png"/></p>"#,
        );
        let data = zip_bytes(&[
            ("OEBPS/c.xhtml", chapter_xml.as_bytes()),
            ("OEBPS/images/cover.png", b"\x89PNG"),
            ("OEBPS/b.png", b"bad"),
        ]);
        let mut archive = ArchiveReader::from_bytes(data).unwrap();
        let mut extractor = ChapterExtractor::new(&mut archive, "OEBPS");

        let chapter = extractor.extract(&entry("c.xhtml", 0)).unwrap().unwrap();
        assert_eq!(chapter.html_content.matches("data:image/png;base64,iVBORw==").count(), 2);
        assert!(!chapter.html_content.contains("images/cover.png"));
        assert!(!chapter.html_content.contains("YmFk"));
    }

    #[test]
    fn test_svg_image_href_is_inlined() {
        let chapter_xml = xhtml(
            "Cover",
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><image xlink:href="cover.jpg"/></svg>"#,
        );
        let data = zip_bytes(&[("OEBPS/c.xhtml", chapter_xml.as_bytes()), ("OEBPS/cover.jpg", b"jpg")]);
        let mut archive = ArchiveReader::from_bytes(data).unwrap();
        let mut extractor = ChapterExtractor::new(&mut archive, "OEBPS");

        let chapter = extractor.extract(&entry("c.xhtml", 0)).unwrap().unwrap();
        assert!(chapter.html_content.contains("data:image/jpeg;base64,anBn"));
    }

    #[test]
    fn test_missing_chapter_is_skipped() {
        let data = zip_bytes(&[("OEBPS/other.xhtml", b"<html/>")]);
        let mut archive = ArchiveReader::from_bytes(data).unwrap();
        let mut extractor = ChapterExtractor::new(&mut archive, "OEBPS");
        assert!(extractor.extract(&entry("c.xhtml", 0)).unwrap().is_none());
    }

    #[test]
    fn test_self_closing_elements_do_not_swallow_siblings() {
        let chapter_xml = xhtml("T", r#"<div id="anchor"/><p>after</p>"#);
        let data = zip_bytes(&[("OEBPS/c.xhtml", chapter_xml.as_bytes())]);
        let mut archive = ArchiveReader::from_bytes(data).unwrap();
        let mut extractor = ChapterExtractor::new(&mut archive, "OEBPS");

        let chapter = extractor.extract(&entry("c.xhtml", 0)).unwrap().unwrap();
        assert_eq!(chapter.html_content, r#"<div id="anchor"></div><p>after</p>"#);
    }

    #[test]
    fn test_mime_table() {
        assert_eq!(image_mime_type("a/b.JPG"), "image/jpeg");
        assert_eq!(image_mime_type("b.svg"), "image/svg+xml");
        assert_eq!(image_mime_type("b.bmp"), "image/bmp");
        assert_eq!(image_mime_type("b.tiff"), "image/jpeg");
    }
}
