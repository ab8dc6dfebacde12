use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpubError>;

/// 解析与分页过程中的错误类型
///
/// 只有容器级、包文档级的问题会以错误返回；章节、图片、目录等资源缺失
/// 在解析流程内部以警告日志吸收。
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    /// 压缩包无法打开，或条目校验失败
    #[error("压缩包损坏: {0}")]
    ArchiveCorrupt(String),

    /// 引导描述文件或包文档缺失、无法解析
    #[error("文件结构错误: {0}")]
    Structural(String),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("配置文件错误: {0}")]
    ConfigError(String),
}

impl From<zip::result::ZipError> for EpubError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io_err) => EpubError::ArchiveCorrupt(io_err.to_string()),
            other => EpubError::ArchiveCorrupt(other.to_string()),
        }
    }
}

impl EpubError {
    /// 是否属于"无法读取的文件"这一类用户可见错误
    pub fn is_unreadable(&self) -> bool {
        matches!(self, EpubError::ArchiveCorrupt(_) | EpubError::Structural(_))
    }
}
