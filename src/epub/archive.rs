use std::io::{Cursor, Read};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::epub::error::{EpubError, Result};

/// 内存中的EPUB压缩包读取器
///
/// 条目不存在时返回`Ok(None)`而不是错误，调用方据此决定是否降级处理
/// （例如可选的目录文件）。只有压缩包本身无法打开或条目校验失败时才返回
/// [`EpubError::ArchiveCorrupt`]。
pub struct ArchiveReader {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ArchiveReader {
    /// 从字节数据打开压缩包
    pub fn from_bytes(data: Vec<u8>) -> Result<ArchiveReader> {
        let archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| EpubError::ArchiveCorrupt(format!("无法打开压缩包: {}", e)))?;
        Ok(ArchiveReader { archive })
    }

    /// 列出压缩包中的所有条目
    pub fn list_files(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// 条目是否存在（精确匹配或忽略大小写匹配）
    pub fn contains(&self, path: &str) -> bool {
        self.locate(path).is_some()
    }

    /// 读取条目的二进制内容
    ///
    /// # 返回值
    /// * `Ok(Some(bytes))` - 条目存在
    /// * `Ok(None)` - 条目不存在
    /// * `Err(ArchiveCorrupt)` - 条目损坏（如CRC校验失败）
    pub fn read_binary(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(name) = self.locate(path) else {
            return Ok(None);
        };

        let mut file = match self.archive.by_name(&name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut buffer = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buffer)
            .map_err(|e| EpubError::ArchiveCorrupt(format!("条目 {} 读取失败: {}", name, e)))?;
        Ok(Some(buffer))
    }

    /// 读取条目的文本内容
    ///
    /// 非UTF-8字节以替换字符处理，开头的BOM会被去掉。
    pub fn read_text(&mut self, path: &str) -> Result<Option<String>> {
        Ok(self.read_binary(path)?.map(|bytes| decode_text(&bytes)))
    }

    /// 查找条目的实际名称，精确匹配失败时尝试忽略大小写
    fn locate(&self, path: &str) -> Option<String> {
        if self.archive.index_for_name(path).is_some() {
            return Some(path.to_string());
        }
        self.archive
            .file_names()
            .find(|name| name.eq_ignore_ascii_case(path))
            .map(str::to_string)
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}
