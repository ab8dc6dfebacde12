//! 单元测试用的EPUB构造工具

use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::FileOptions;

pub const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#;

/// 把若干(路径, 内容)写成内存中的zip
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, FileOptions::<()>::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// 包裹正文生成一个XHTML章节文档
pub fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{}</title></head>
<body>{}</body>
</html>"#,
        title, body
    )
}

/// 简单的EPUB构造器，OPF位于`OEBPS/content.opf`
pub struct EpubFixture {
    chapters: Vec<(String, String)>,
    extra_manifest: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
    metadata: String,
    spine_toc: Option<String>,
    include_container: bool,
}

impl EpubFixture {
    pub fn new() -> Self {
        Self {
            chapters: Vec::new(),
            extra_manifest: Vec::new(),
            files: Vec::new(),
            metadata: "<dc:title>Test Book</dc:title><dc:creator>Test Author</dc:creator>\
                       <dc:identifier id=\"BookId\">urn:test:1</dc:identifier><dc:language>en</dc:language>"
                .to_string(),
            spine_toc: None,
            include_container: true,
        }
    }

    /// 添加章节，`href`相对于OPF目录
    pub fn chapter(mut self, id: &str, href: &str, content: &str) -> Self {
        self.chapters.push((id.to_string(), href.to_string()));
        self.files.push((format!("OEBPS/{}", href), content.as_bytes().to_vec()));
        self
    }

    /// 只在清单和脊柱中声明章节，不写入文件
    pub fn missing_chapter(mut self, id: &str, href: &str) -> Self {
        self.chapters.push((id.to_string(), href.to_string()));
        self
    }

    /// 添加额外的清单项与文件
    pub fn resource(mut self, id: &str, href: &str, media_type: &str, properties: Option<&str>, content: &[u8]) -> Self {
        let props = properties.map(|p| format!(" properties=\"{}\"", p)).unwrap_or_default();
        self.extra_manifest.push(format!(
            "<item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>",
            id, href, media_type, props
        ));
        self.files.push((format!("OEBPS/{}", href), content.to_vec()));
        self
    }

    pub fn metadata(mut self, metadata: &str) -> Self {
        self.metadata = metadata.to_string();
        self
    }

    pub fn spine_toc(mut self, id: &str) -> Self {
        self.spine_toc = Some(id.to_string());
        self
    }

    pub fn without_container(mut self) -> Self {
        self.include_container = false;
        self
    }

    pub fn opf(&self) -> String {
        let mut manifest = String::new();
        let mut spine = String::new();
        for (id, href) in &self.chapters {
            manifest.push_str(&format!(
                "<item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>",
                id, href
            ));
            spine.push_str(&format!("<itemref idref=\"{}\"/>", id));
        }
        for item in &self.extra_manifest {
            manifest.push_str(item);
        }
        let toc_attr = self
            .spine_toc
            .as_ref()
            .map(|id| format!(" toc=\"{}\"", id))
            .unwrap_or_default();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="3.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">{}</metadata>
<manifest>{}</manifest>
<spine{}>{}</spine>
</package>"#,
            self.metadata, manifest, toc_attr, spine
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let opf = self.opf();
        let mut entries: Vec<(&str, &[u8])> = vec![("mimetype", b"application/epub+zip".as_slice())];
        if self.include_container {
            entries.push(("META-INF/container.xml", CONTAINER_XML.as_bytes()));
        }
        entries.push(("OEBPS/content.opf", opf.as_bytes()));
        for (path, content) in &self.files {
            entries.push((path.as_str(), content.as_slice()));
        }
        zip_bytes(&entries)
    }
}
