//! 压缩包内路径处理
//!
//! EPUB内部引用使用URL风格的相对路径，这里负责把它们解析为压缩包条目名。

use percent_encoding::percent_decode_str;

/// 获取路径所在目录（不含结尾的`/`），根目录返回空字符串
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// 去掉引用中的片段(`#...`)和查询串(`?...`)
pub fn strip_fragment(href: &str) -> &str {
    let end = href.find(['#', '?']).unwrap_or(href.len());
    &href[..end]
}

/// 返回引用中的片段部分（不含`#`）
pub fn fragment(href: &str) -> Option<&str> {
    href.split_once('#').map(|(_, frag)| frag).filter(|frag| !frag.is_empty())
}

/// 将`href`相对于`base_dir`解析为压缩包内的完整路径
///
/// - 以`/`开头的路径视为压缩包绝对路径
/// - 处理`.`与`..`片段，越过根目录的`..`被忽略
/// - 百分号编码会被解码
pub fn resolve(base_dir: &str, href: &str) -> String {
    let href = strip_fragment(href);
    let decoded = percent_decode_str(href).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    let relative = if let Some(absolute) = decoded.strip_prefix('/') {
        absolute
    } else {
        segments.extend(base_dir.split('/').filter(|s| !s.is_empty()));
        decoded.as_ref()
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// 将压缩包内完整路径转换为相对`base_dir`的路径（仅当位于其下时）
pub fn relative_to(base_dir: &str, full_path: &str) -> String {
    if base_dir.is_empty() {
        return full_path.to_string();
    }
    full_path
        .strip_prefix(base_dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(str::to_string)
        .unwrap_or_else(|| full_path.to_string())
}

/// 取文件扩展名（小写）
pub fn extension(path: &str) -> Option<String> {
    let file_name = strip_fragment(path).rsplit('/').next()?;
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
