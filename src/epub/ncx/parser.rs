//! NCX解析器模块
//!
//! 把旧版导航控制文件的navMap解析为目录树。

use crate::epub::error::{EpubError, Result};
use crate::epub::toc::TocEntry;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// 解析中的导航点
struct PendingNavPoint {
    id: String,
    play_order: u32,
    label: String,
    src: String,
    children: Vec<PendingNavPoint>,
}

impl PendingNavPoint {
    /// 转换为目录项；子项按playOrder稳定排序后以兄弟序号作为order
    fn into_entry(self, order: usize, level: usize) -> TocEntry {
        let mut children = self.children;
        children.sort_by_key(|child| child.play_order);
        let children = children
            .into_iter()
            .enumerate()
            .map(|(i, child)| child.into_entry(i, level + 1))
            .collect();

        TocEntry {
            id: self.id,
            title: self.label,
            href: self.src,
            order,
            level,
            children,
        }
    }
}

/// 解析NCX文件内容为目录树
///
/// # 参数
/// * `xml_content` - NCX文件的XML内容
///
/// # 返回值
/// * `Result<Vec<TocEntry>>` - 顶层目录项；没有navMap时返回空列表
pub fn parse_ncx(xml_content: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(xml_content);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut in_nav_map = false;
    let mut in_label = false;
    let mut text_content = String::new();

    let mut roots: Vec<PendingNavPoint> = Vec::new();
    // 当前打开的导航点，栈顶为最内层
    let mut stack: Vec<PendingNavPoint> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"navMap" => in_nav_map = true,
                b"navPoint" if in_nav_map => {
                    let (id, play_order) = parse_nav_point_attributes(e)?;
                    stack.push(PendingNavPoint {
                        id,
                        play_order,
                        label: String::new(),
                        src: String::new(),
                        children: Vec::new(),
                    });
                }
                b"navLabel" if in_nav_map => {
                    in_label = true;
                    text_content.clear();
                }
                b"content" if in_nav_map => set_content_src(e, &mut stack)?,
                _ => {}
            },
            Event::Empty(ref e) => {
                if in_nav_map && e.local_name().as_ref() == b"content" {
                    set_content_src(e, &mut stack)?;
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"navMap" => in_nav_map = false,
                b"navLabel" if in_nav_map => {
                    in_label = false;
                    if let Some(current) = stack.last_mut() {
                        if current.label.is_empty() {
                            current.label = text_content.split_whitespace().collect::<Vec<_>>().join(" ");
                        }
                    }
                }
                b"navPoint" if in_nav_map => {
                    if let Some(finished) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(finished),
                            None => roots.push(finished),
                        }
                    }
                }
                _ => {}
            },
            Event::Text(e) if in_label => {
                text_content.push_str(&e.unescape()?);
                text_content.push(' ');
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    roots.sort_by_key(|point| point.play_order);
    Ok(roots
        .into_iter()
        .filter(|point| !point.label.is_empty() || !point.src.is_empty())
        .enumerate()
        .map(|(i, point)| point.into_entry(i, 0))
        .collect())
}

/// 解析navPoint元素的属性
fn parse_nav_point_attributes(e: &BytesStart) -> Result<(String, u32)> {
    let mut id = String::new();
    let mut play_order = 0;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        match attr.key.local_name().as_ref() {
            b"id" => {
                id = String::from_utf8_lossy(&attr.value).to_string();
            }
            b"playOrder" => {
                play_order = String::from_utf8_lossy(&attr.value).trim().parse().unwrap_or(0);
            }
            _ => {}
        }
    }

    Ok((id, play_order))
}

/// 解析content元素的src属性并写入当前导航点
fn set_content_src(e: &BytesStart, stack: &mut [PendingNavPoint]) -> Result<()> {
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        if attr.key.local_name().as_ref() == b"src" {
            if let Some(current) = stack.last_mut() {
                current.src = String::from_utf8_lossy(&attr.value).trim().to_string();
            }
        }
    }
    Ok(())
}
