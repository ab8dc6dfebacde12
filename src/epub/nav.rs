//! EPUB3导航文档解析

use scraper::{ElementRef, Html};

use crate::epub::toc::TocEntry;

/// 解析导航文档中的目录
///
/// 只使用`epub:type`（或`role="doc-toc"`）标记为toc的nav元素；
/// landmarks、page-list等其他nav不算目录，没有toc时返回空列表。
pub fn parse_nav_document(content: &str) -> Vec<TocEntry> {
    let document = Html::parse_document(content);
    let navs: Vec<ElementRef> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "nav")
        .collect();

    let is_toc_nav = |nav: &ElementRef| {
        let epub_type = nav.value().attr("epub:type").or_else(|| nav.value().attr("type"));
        epub_type.is_some_and(|t| t.split_whitespace().any(|v| v == "toc"))
            || nav.value().attr("role") == Some("doc-toc")
    };

    navs.iter()
        .find(|nav| is_toc_nav(*nav))
        .and_then(|nav| first_list(*nav))
        .map(|ol| parse_list(ol, 0))
        .unwrap_or_default()
}

fn first_list(element: ElementRef) -> Option<ElementRef> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "ol" | "ul"))
}

fn parse_list(list: ElementRef, level: usize) -> Vec<TocEntry> {
    list.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .filter_map(|li| parse_item(li, level))
        .enumerate()
        .map(|(order, mut entry)| {
            entry.order = order;
            entry
        })
        .collect()
}

fn parse_item(li: ElementRef, level: usize) -> Option<TocEntry> {
    let mut href = String::new();
    let mut title = String::new();
    let mut element_id = li.value().attr("id").map(str::to_string);
    let mut children = Vec::new();

    for child in li.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "a" => {
                href = child.value().attr("href").unwrap_or_default().to_string();
                title = collapse_text(child);
                if element_id.is_none() {
                    element_id = child.value().attr("id").map(str::to_string);
                }
            }
            "span" if title.is_empty() => title = collapse_text(child),
            "ol" | "ul" => children = parse_list(child, level + 1),
            _ => {}
        }
    }

    // 链接被包在其他元素里的情况
    if href.is_empty() && title.is_empty() {
        if let Some(anchor) = li
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "a")
        {
            href = anchor.value().attr("href").unwrap_or_default().to_string();
            title = collapse_text(anchor);
        }
    }

    if title.is_empty() && href.is_empty() {
        return None;
    }

    Some(TocEntry {
        id: element_id.unwrap_or_else(|| format!("toc-{}-{}", level, href.replace(['/', '#', '.'], "-"))),
        title,
        href,
        order: 0,
        level,
        children,
    })
}

fn collapse_text(element: ElementRef) -> String {
    element.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}
