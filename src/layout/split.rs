//! 超高块的结构拆分
//!
//! 只有两种块可以拆分：
//! - 含换行的引用块（诗歌类内容），按固定行数分段，第一段保持引用块，
//!   其余段作为带`blockquote-continuation`类名的续接段落
//! - 列表，每项拆成一个单项列表
//!
//! 拆分后相邻部分会在高度预算内贪心地重新合并。

use scraper::{ElementRef, Html, Node};

use crate::layout::config::BLOCKQUOTE_CHUNK_LINES;
use crate::layout::measure::Measurer;
use crate::layout::segment::{ContentSegment, SegmentType, collapse_whitespace};

/// 续接段落的类名
pub const CONTINUATION_CLASS: &str = "blockquote-continuation";

/// 拆分出的一部分，合并时保留第一部分的外层标签
#[derive(Debug, Clone)]
struct Part {
    segment_type: SegmentType,
    open: String,
    inner: String,
    close: String,
    text: String,
}

/// 拆分方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitKind {
    /// 行之间以`<br/>`连接
    Lines,
    /// 列表项直接拼接
    Items,
}

impl SplitKind {
    fn joiner(self) -> &'static str {
        match self {
            SplitKind::Lines => "<br/>",
            SplitKind::Items => "",
        }
    }
}

/// 块是否有结构拆分的可能
pub fn is_splittable(segment: &ContentSegment) -> bool {
    match segment.segment_type {
        SegmentType::Blockquote => segment.html_content.contains("<br"),
        SegmentType::List => segment.html_content.contains("<li"),
        _ => false,
    }
}

/// 拆分并合并，返回至少两部分；无法拆分时返回`None`
pub fn split_to_fit(segment: &ContentSegment, budget: f32, measurer: &Measurer) -> Option<Vec<ContentSegment>> {
    let (kind, parts) = match segment.segment_type {
        SegmentType::Blockquote => (SplitKind::Lines, split_blockquote(segment)?),
        SegmentType::List => (SplitKind::Items, split_list(segment)?),
        _ => return None,
    };
    if parts.len() < 2 {
        return None;
    }

    let combined = combine_parts(parts, kind, budget, &segment.id, measurer);
    (combined.len() >= 2).then_some(combined)
}

fn parse_root(segment: &ContentSegment) -> Html {
    Html::parse_fragment(&segment.html_content)
}

fn first_element(fragment: &Html) -> Option<ElementRef<'_>> {
    fragment.root_element().children().find_map(ElementRef::wrap)
}

/// 按换行切分引用块
fn split_blockquote(segment: &ContentSegment) -> Option<Vec<Part>> {
    let fragment = parse_root(segment);
    let blockquote = first_element(&fragment).filter(|el| el.value().name() == "blockquote")?;

    let mut lines = Vec::new();
    let mut current = String::new();
    collect_lines(blockquote, &mut lines, &mut current);
    end_line(&mut lines, &mut current);

    if lines.len() <= BLOCKQUOTE_CHUNK_LINES {
        return None;
    }

    let open = open_tag(blockquote, &[]);
    let parts = lines
        .chunks(BLOCKQUOTE_CHUNK_LINES)
        .enumerate()
        .map(|(i, chunk)| {
            let inner = chunk.iter().map(|(html, _)| html.as_str()).collect::<Vec<_>>().join("<br/>");
            let text = chunk.iter().map(|(_, text)| text.as_str()).collect::<Vec<_>>().join(" ");
            if i == 0 {
                Part {
                    segment_type: SegmentType::Blockquote,
                    open: open.clone(),
                    inner,
                    close: "</blockquote>".to_string(),
                    text,
                }
            } else {
                Part {
                    segment_type: SegmentType::Paragraph,
                    open: format!("<p class=\"{}\">", CONTINUATION_CLASS),
                    inner,
                    close: "</p>".to_string(),
                    text,
                }
            }
        })
        .collect();
    Some(parts)
}

/// 收集行：`<br>`和块级子元素的边界都结束一行
fn collect_lines(parent: ElementRef, lines: &mut Vec<(String, String)>, current: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => {
                let text: &str = text;
                current.push_str(&html_escape::encode_text(text));
            }
            Node::Element(el) => {
                let Some(element) = ElementRef::wrap(child) else { continue };
                match el.name() {
                    "br" => end_line(lines, current),
                    "p" | "div" | "span" if has_line_break(element) || el.name() != "span" => {
                        end_line(lines, current);
                        collect_lines(element, lines, current);
                        end_line(lines, current);
                    }
                    _ => current.push_str(&element.html()),
                }
            }
            _ => {}
        }
    }
}

fn has_line_break(element: ElementRef) -> bool {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "br")
}

/// 结束当前行，空行被丢弃
fn end_line(lines: &mut Vec<(String, String)>, current: &mut String) {
    let html = std::mem::take(current);
    let html = html.trim();
    if html.is_empty() {
        return;
    }
    let text = collapse_whitespace(&Html::parse_fragment(html).root_element().text().collect::<String>());
    lines.push((html.to_string(), text));
}

/// 每项一个单项列表；有序列表通过`start`保持编号
fn split_list(segment: &ContentSegment) -> Option<Vec<Part>> {
    let fragment = parse_root(segment);
    let list = first_element(&fragment).filter(|el| matches!(el.value().name(), "ul" | "ol" | "dl"))?;
    let tag = list.value().name();

    let items: Vec<ElementRef> = list.children().filter_map(ElementRef::wrap).collect();
    if items.len() < 2 {
        return None;
    }

    let start: i64 = list.value().attr("start").and_then(|s| s.trim().parse().ok()).unwrap_or(1);
    let parts = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let open = if tag == "ol" {
                let start_attr = (start + i as i64).to_string();
                open_tag(list, &[("start", start_attr.as_str())])
            } else {
                open_tag(list, &[])
            };
            Part {
                segment_type: SegmentType::List,
                open,
                inner: item.html(),
                close: format!("</{}>", tag),
                text: collapse_whitespace(&item.text().collect::<Vec<_>>().join(" ")),
            }
        })
        .collect();
    Some(parts)
}

/// 重建开始标签，`overrides`替换或追加属性
fn open_tag(element: ElementRef, overrides: &[(&str, &str)]) -> String {
    let mut tag = format!("<{}", element.value().name());
    for (name, value) in element.value().attrs() {
        if overrides.iter().any(|(key, _)| *key == name) {
            continue;
        }
        tag.push_str(&format!(" {}=\"{}\"", name, html_escape::encode_double_quoted_attribute(value)));
    }
    for (name, value) in overrides {
        tag.push_str(&format!(" {}=\"{}\"", name, html_escape::encode_double_quoted_attribute(value)));
    }
    tag.push('>');
    tag
}

fn merge(first: &Part, second: &Part, kind: SplitKind) -> Part {
    Part {
        segment_type: first.segment_type,
        open: first.open.clone(),
        inner: format!("{}{}{}", first.inner, kind.joiner(), second.inner),
        close: first.close.clone(),
        text: format!("{} {}", first.text, second.text),
    }
}

fn to_segment(part: &Part, id: String) -> ContentSegment {
    ContentSegment::new(
        id,
        part.segment_type,
        format!("{}{}{}", part.open, part.inner, part.close),
        part.text.clone(),
    )
}

/// 贪心合并相邻部分，每次合并都重新测量
fn combine_parts(parts: Vec<Part>, kind: SplitKind, budget: f32, base_id: &str, measurer: &Measurer) -> Vec<ContentSegment> {
    let mut combined: Vec<Part> = Vec::new();
    for part in parts {
        if let Some(last) = combined.last_mut() {
            let candidate = merge(last, &part, kind);
            if measurer.measure_one(&to_segment(&candidate, String::new())) <= budget {
                *last = candidate;
                continue;
            }
        }
        combined.push(part);
    }

    combined
        .iter()
        .enumerate()
        .map(|(i, part)| to_segment(part, format!("{}-part-{}", base_id, i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::config::FittingConfig;
    use crate::layout::measure::MeasurementProvider;

    /// 每行20像素：按行标记计数
    fn line_counter(html: &str, _: &FittingConfig) -> Option<f32> {
        let lines = ["<br", "<p", "<blockquote", "<li", "<h"]
            .iter()
            .map(|marker| html.matches(marker).count())
            .sum::<usize>();
        Some(lines as f32 * 20.0)
    }

    fn poem(lines: usize) -> ContentSegment {
        let body = (1..=lines).map(|i| format!("Line {}", i)).collect::<Vec<_>>().join("<br>");
        ContentSegment::new(
            "c-seg-0".to_string(),
            SegmentType::Blockquote,
            format!("<blockquote class=\"poem\">{}</blockquote>", body),
            String::new(),
        )
    }

    #[test]
    fn test_blockquote_split_into_chunks() {
        let config = FittingConfig::default();
        let provider: &dyn MeasurementProvider = &line_counter;
        let measurer = Measurer::new(Some(provider), &config);

        let parts = split_to_fit(&poem(12), 110.0 * 0.95, &measurer).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].segment_type, SegmentType::Blockquote);
        assert!(parts[0].html_content.starts_with("<blockquote class=\"poem\">Line 1<br/>"));
        assert!(parts[0].html_content.contains("Line 5</blockquote>"));
        assert_eq!(parts[1].segment_type, SegmentType::Paragraph);
        assert!(parts[1].html_content.starts_with("<p class=\"blockquote-continuation\">Line 6"));
        assert_eq!(parts[2].text_content, "Line 11 Line 12");
        assert_eq!(parts[2].id, "c-seg-0-part-2");
    }

    #[test]
    fn test_blockquote_chunks_recombine_when_budget_allows() {
        let config = FittingConfig::default();
        let provider: &dyn MeasurementProvider = &line_counter;
        let measurer = Measurer::new(Some(provider), &config);

        // 预算为11行：前两段合并为10行，剩余2行单独成段
        let parts = split_to_fit(&poem(12), 220.0, &measurer).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].html_content.contains("Line 10</blockquote>"));
        assert!(parts[1].html_content.contains("Line 11<br/>Line 12"));
    }

    #[test]
    fn test_blockquote_with_paragraph_lines() {
        let html = "<blockquote><p>a<br/>b<br/>c</p><p>d<br/>e<br/>f</p></blockquote>";
        let segment = ContentSegment::new("q".to_string(), SegmentType::Blockquote, html.to_string(), String::new());
        let config = FittingConfig::default();
        let provider: &dyn MeasurementProvider = &line_counter;
        let measurer = Measurer::new(Some(provider), &config);

        let parts = split_to_fit(&segment, 100.0, &measurer).unwrap();
        let text: Vec<&str> = parts.iter().map(|p| p.text_content.as_str()).collect();
        assert_eq!(text, vec!["a b c d e", "f"]);
    }

    #[test]
    fn test_list_split_keeps_numbering() {
        let html = r#"<ol class="steps" start="3"><li>a</li><li>b</li><li>c</li></ol>"#;
        let segment = ContentSegment::new("l".to_string(), SegmentType::List, html.to_string(), String::new());
        let config = FittingConfig::default();
        let provider: &dyn MeasurementProvider = &line_counter;
        let measurer = Measurer::new(Some(provider), &config);

        let parts = split_to_fit(&segment, 30.0, &measurer).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].html_content, r#"<ol class="steps" start="3"><li>a</li></ol>"#);
        assert_eq!(parts[2].html_content, r#"<ol class="steps" start="5"><li>c</li></ol>"#);
        assert!(parts.iter().all(|p| p.segment_type == SegmentType::List));

        let merged = split_to_fit(&segment, 40.0, &measurer).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].html_content, r#"<ol class="steps" start="3"><li>a</li><li>b</li></ol>"#);
    }

    #[test]
    fn test_unsplittable_segments() {
        let config = FittingConfig::default();
        let measurer = Measurer::new(None, &config);
        let image = ContentSegment::new("i".to_string(), SegmentType::Image, "<img src=\"a\">".to_string(), String::new());
        assert!(!is_splittable(&image));
        assert!(split_to_fit(&image, 10.0, &measurer).is_none());

        let short = poem(4);
        assert!(is_splittable(&short));
        assert!(split_to_fit(&short, 10.0, &measurer).is_none());

        let single = ContentSegment::new("l".to_string(), SegmentType::List, "<ul><li>only</li></ul>".to_string(), String::new());
        assert!(split_to_fit(&single, 10.0, &measurer).is_none());
    }
}
