//! 引导描述文件(META-INF/container.xml)解析
//!
//! 引导描述文件是EPUB中唯一位置固定的文件，它指明包文档(OPF)的位置。

use crate::epub::archive::ArchiveReader;
use crate::epub::error::{EpubError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// 引导描述文件在压缩包中的固定位置
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// 包文档的标准媒体类型
const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

const MISSING_DESCRIPTOR: &str = "缺少引导描述文件(missing bootstrap descriptor)";
const MISSING_PACKAGE_PATH: &str = "缺少包文档路径(missing package path)";

/// 描述文件中的一个rootfile条目
#[derive(Debug, Clone, PartialEq)]
pub struct RootFile {
    pub full_path: String,
    /// 部分旧文件省略了media-type，此时为空
    pub media_type: String,
}

impl RootFile {
    /// 从`<rootfile>`标签的属性构造；没有`full-path`时返回`None`
    fn from_start(e: &BytesStart) -> Option<RootFile> {
        let mut full_path = None;
        let mut media_type = String::new();
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).trim().to_string();
            match attr.key.local_name().as_ref() {
                b"full-path" => full_path = Some(value),
                b"media-type" => media_type = value,
                _ => {}
            }
        }
        full_path
            .filter(|path| !path.is_empty())
            .map(|full_path| RootFile { full_path, media_type })
    }

    pub fn is_package(&self) -> bool {
        self.media_type == PACKAGE_MEDIA_TYPE
    }
}

/// 引导描述文件的解析结果
#[derive(Debug, Clone)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

impl Container {
    /// 解析container.xml内容
    ///
    /// XML损坏或没有任何rootfile时返回`Structural`错误。
    pub fn parse_xml(xml_content: &str) -> Result<Container> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut rootfiles = Vec::new();
        let mut buf = Vec::new();
        let mut depth_in_rootfiles = 0usize;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| EpubError::Structural(format!("{}: {}", MISSING_DESCRIPTOR, e)))?;
            match event {
                Event::Start(ref e) if e.local_name().as_ref() == b"rootfiles" => depth_in_rootfiles += 1,
                Event::End(ref e) if e.local_name().as_ref() == b"rootfiles" => {
                    depth_in_rootfiles = depth_in_rootfiles.saturating_sub(1)
                }
                Event::Start(ref e) | Event::Empty(ref e)
                    if depth_in_rootfiles > 0 && e.local_name().as_ref() == b"rootfile" =>
                {
                    rootfiles.extend(RootFile::from_start(e));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if rootfiles.is_empty() {
            return Err(EpubError::Structural(MISSING_PACKAGE_PATH.to_string()));
        }
        Ok(Container { rootfiles })
    }

    /// 包文档路径：优先标准媒体类型，否则取第一个条目
    pub fn package_path(&self) -> Option<&str> {
        self.rootfiles
            .iter()
            .find(|rootfile| rootfile.is_package())
            .or_else(|| self.rootfiles.first())
            .map(|rootfile| rootfile.full_path.as_str())
    }
}

/// 从压缩包中定位包文档路径
///
/// # 错误
/// * 引导描述文件不存在或无法解析 - `Structural("missing bootstrap descriptor")`
/// * 描述文件没有指向任何包文档 - `Structural("missing package path")`
pub fn resolve_package_path(archive: &mut ArchiveReader) -> Result<String> {
    let content = archive
        .read_text(CONTAINER_PATH)?
        .ok_or_else(|| EpubError::Structural(MISSING_DESCRIPTOR.to_string()))?;

    let container = Container::parse_xml(&content)?;
    container
        .package_path()
        .map(str::to_string)
        .ok_or_else(|| EpubError::Structural(MISSING_PACKAGE_PATH.to_string()))
}
