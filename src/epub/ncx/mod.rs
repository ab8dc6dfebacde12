//! NCX（Navigation Control file for XML）文件解析模块
//!
//! NCX是EPUB2的目录格式，在EPUB3中作为导航文档缺失时的后备。

mod parser;

pub use parser::parse_ncx;
