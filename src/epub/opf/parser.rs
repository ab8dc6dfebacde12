//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）包文档的XML解析功能。

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{
    manifest::{Manifest, ManifestItem},
    metadata::{BookMetadata, Metadata},
    spine::{Spine, SpineItem},
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// OPF文件解析结果，构建完成后只读
#[derive(Debug, Clone)]
pub struct Opf {
    /// EPUB版本
    pub version: String,
    /// 顶层元数据
    pub metadata: BookMetadata,
    /// 清单(ID → 资源)
    pub manifest: Manifest,
    /// 脊柱(阅读顺序)
    pub spine: Spine,
    /// 脊柱的目录引用(NCX清单ID)
    pub spine_toc: Option<String>,
}

#[derive(PartialEq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
}

impl Opf {
    /// 解析OPF文件内容
    ///
    /// # 参数
    /// * `xml_content` - OPF文件的XML内容
    ///
    /// # 返回值
    /// * `Result<Opf, EpubError>` - 解析后的OPF信息，XML不合法时返回结构错误
    pub fn parse_xml(xml_content: &str) -> Result<Opf> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut version = String::new();
        let mut metadata = Metadata::new();
        let mut manifest_items = Vec::new();
        let mut spine_items = Vec::new();
        let mut spine_toc = None;
        let mut saw_package = false;

        let mut buf = Vec::new();
        let mut section = Section::None;
        let mut text_content = String::new();
        let mut current_attributes = HashMap::new();
        // 带文本内容的meta标签: (refines, property)
        let mut pending_meta: Option<(Option<String>, String)> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| EpubError::Structural(format!("包文档无法解析: {}", e)))?;
            match event {
                Event::Start(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    match (local_name.as_str(), &section) {
                        ("package", _) => {
                            saw_package = true;
                            version = attributes_of(e).remove("version").unwrap_or_default();
                        }
                        ("metadata", _) => section = Section::Metadata,
                        ("manifest", _) => section = Section::Manifest,
                        ("spine", _) => {
                            section = Section::Spine;
                            spine_toc = attributes_of(e).remove("toc");
                        }
                        ("item", Section::Manifest) => Self::parse_manifest_item(e, &mut manifest_items),
                        ("itemref", Section::Spine) => Self::parse_spine_item(e, &mut spine_items),
                        ("meta", Section::Metadata) => {
                            pending_meta = Self::handle_meta_tag(e, &mut metadata);
                            text_content.clear();
                        }
                        (_, Section::Metadata) => {
                            current_attributes = attributes_of(e);
                            text_content.clear();
                        }
                        _ => {}
                    }
                }
                Event::Empty(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    match (local_name.as_str(), &section) {
                        ("meta", Section::Metadata) => {
                            Self::handle_meta_tag(e, &mut metadata);
                        }
                        ("item", Section::Manifest) => Self::parse_manifest_item(e, &mut manifest_items),
                        ("itemref", Section::Spine) => Self::parse_spine_item(e, &mut spine_items),
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    match local_name.as_str() {
                        "metadata" | "manifest" | "spine" => section = Section::None,
                        "meta" if section == Section::Metadata => {
                            if let Some((refines, property)) = pending_meta.take() {
                                let content = text_content.trim().to_string();
                                match refines {
                                    Some(id) => metadata.add_refines(id, property, content),
                                    None => metadata.add_meta(property, content),
                                }
                            }
                        }
                        tag if section == Section::Metadata => {
                            // quick_xml的local_name()去掉了命名空间前缀，<dc:title> → "title"
                            let content = text_content.trim();
                            if !content.is_empty() {
                                metadata.add_dublin_core(
                                    tag.to_string(),
                                    content.to_string(),
                                    std::mem::take(&mut current_attributes),
                                );
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|err| EpubError::Structural(format!("包文档文本无法解析: {}", err)))?;
                    text_content.push_str(&text);
                }
                Event::CData(e) => {
                    text_content.push_str(&String::from_utf8_lossy(&e));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_package {
            return Err(EpubError::Structural("包文档缺少package根元素".to_string()));
        }

        let manifest = Manifest::from_items(manifest_items);
        let spine = Spine::resolve(&spine_items, &manifest);
        let metadata = Self::finish_metadata(&metadata, &manifest);

        Ok(Opf {
            version,
            metadata,
            manifest,
            spine,
            spine_toc,
        })
    }

    /// 处理meta标签
    ///
    /// 属性中已带有内容的直接记录；需要等待文本内容的返回`(refines, property)`。
    fn handle_meta_tag(e: &BytesStart, metadata: &mut Metadata) -> Option<(Option<String>, String)> {
        let mut attributes = attributes_of(e);
        let name = attributes.remove("name").unwrap_or_default();
        let content = attributes.remove("content").unwrap_or_default();
        let property = attributes.remove("property").unwrap_or_default();
        let refines = attributes.remove("refines").filter(|r| !r.is_empty());

        if !name.is_empty() && !content.is_empty() {
            metadata.add_meta(name, content);
            return None;
        }
        if property.is_empty() {
            return None;
        }
        if !content.is_empty() {
            match refines {
                Some(id) => metadata.add_refines(id, property, content),
                None => metadata.add_meta(property, content),
            }
            return None;
        }
        Some((refines, property))
    }

    /// 解析清单项，缺少id/href的项被忽略
    fn parse_manifest_item(e: &BytesStart, manifest: &mut Vec<ManifestItem>) {
        let mut attributes = attributes_of(e);
        let id = attributes.remove("id").unwrap_or_default();
        let href = attributes.remove("href").unwrap_or_default();
        if id.is_empty() || href.is_empty() {
            return;
        }
        manifest.push(ManifestItem {
            id,
            href,
            media_type: attributes.remove("media-type").unwrap_or_default(),
            properties: attributes.remove("properties"),
        });
    }

    /// 解析脊柱项
    fn parse_spine_item(e: &BytesStart, spine: &mut Vec<SpineItem>) {
        let mut attributes = attributes_of(e);
        let idref = attributes.remove("idref").unwrap_or_default();
        if idref.is_empty() {
            return;
        }
        let linear = attributes.remove("linear").map(|v| v != "no").unwrap_or(true);
        spine.push(SpineItem { idref, linear });
    }

    fn finish_metadata(metadata: &Metadata, manifest: &Manifest) -> BookMetadata {
        // 封面：先看cover-image属性，再看<meta name="cover">（可能是ID也可能是路径）
        let cover_href = manifest
            .cover_image_item()
            .map(|item| item.href.clone())
            .or_else(|| {
                metadata.cover().map(|cover| match manifest.get(&cover) {
                    Some(item) => item.href.clone(),
                    None => cover,
                })
            });

        BookMetadata {
            title: metadata.title(),
            authors: metadata.creators(),
            identifiers: metadata.identifiers(),
            description: metadata.description(),
            language: metadata.language(),
            publisher: metadata.publisher(),
            cover_href,
        }
    }

    /// 导航文档(EPUB3 nav)
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.manifest.nav_item()
    }

    /// NCX文件：优先spine的toc属性，其次按媒体类型查找
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.spine_toc
            .as_deref()
            .and_then(|id| self.manifest.get(id))
            .filter(|item| item.is_ncx())
            .or_else(|| self.manifest.ncx_item())
    }
}

/// 收集元素属性（key为去掉命名空间前缀的本地名）
fn attributes_of(e: &BytesStart) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_xml_parsing() {
        let simple_xml = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">"#,
            r#"<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">"#,
            r#"<dc:title>Test Book</dc:title>"#,
            r#"<dc:creator id="author1">Test Author</dc:creator>"#,
            r##"<meta refines="#author1" property="role" scheme="marc:relators">aut</meta>"##,
            r#"</metadata>"#,
            r#"<manifest></manifest>"#,
            r#"<spine></spine>"#,
            r#"</package>"#
        );

        let opf = Opf::parse_xml(simple_xml).expect("解析简单OPF失败");
        assert_eq!(opf.version, "3.0");
        assert_eq!(opf.metadata.title.as_deref(), Some("Test Book"));
        assert_eq!(opf.metadata.authors.len(), 1);
        assert_eq!(opf.metadata.authors[0].name, "Test Author");
        assert_eq!(opf.metadata.authors[0].role.as_deref(), Some("author"));
    }

    #[test]
    fn test_full_package() {
        let opf_xml = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
<dc:title>Sample Book</dc:title>
<dc:creator opf:role="aut" opf:file-as="Author, Sample">Sample Author</dc:creator>
<dc:creator>Second Author</dc:creator>
<dc:identifier id="BookId" opf:scheme="ISBN">978-1234567890</dc:identifier>
<dc:description>A &amp; B</dc:description>
<dc:language>en</dc:language>
<dc:publisher>Pub House</dc:publisher>
<meta name="cover" content="cover-img"/>
</metadata>
<manifest>
<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
<item id="cover-img" href="images/cover.jpg" media-type="image/jpeg"/>
<item id="item1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
<item id="item2" href="chapter2.xhtml" media-type="application/xhtml+xml"/>
</manifest>
<spine toc="ncx">
<itemref idref="item1"/>
<itemref idref="missing"/>
<itemref idref="item2" linear="no"/>
</spine>
</package>"#;

        let opf = Opf::parse_xml(opf_xml).expect("解析OPF失败");
        assert_eq!(opf.metadata.authors.len(), 2);
        assert_eq!(opf.metadata.authors[0].role.as_deref(), Some("author"));
        assert_eq!(opf.metadata.authors[0].file_as.as_deref(), Some("Author, Sample"));
        assert_eq!(opf.metadata.identifiers[0].scheme.as_deref(), Some("ISBN"));
        assert_eq!(opf.metadata.description.as_deref(), Some("A & B"));
        assert_eq!(opf.metadata.publisher.as_deref(), Some("Pub House"));
        assert_eq!(opf.metadata.cover_href.as_deref(), Some("images/cover.jpg"));

        assert_eq!(opf.manifest.len(), 4);
        assert_eq!(opf.spine.len(), 2);
        assert_eq!(opf.spine.entries()[1].href, "chapter2.xhtml");
        assert_eq!(opf.ncx_item().map(|i| i.id.as_str()), Some("ncx"));
        assert!(opf.nav_item().is_none());
    }

    #[test]
    fn test_malformed_package_is_structural_error() {
        let result = Opf::parse_xml("<package><metadata></manifest></package>");
        assert!(matches!(result, Err(EpubError::Structural(_))));

        let result = Opf::parse_xml("just text");
        assert!(matches!(result, Err(EpubError::Structural(_))));
    }
}
