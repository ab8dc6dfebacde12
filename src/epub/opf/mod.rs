//! OPF（Open Packaging Format）文件解析模块
//!
//! 此模块提供EPUB文件中OPF包文件的解析功能，产出只读的清单、脊柱与顶层元数据。

mod manifest;
mod metadata;
mod parser;
mod spine;

pub use manifest::{Manifest, ManifestItem, NCX_MEDIA_TYPE};
pub use metadata::{BookMetadata, Creator, Identifier, Metadata};
pub use parser::Opf;
pub use spine::{Spine, SpineEntry, SpineItem};
