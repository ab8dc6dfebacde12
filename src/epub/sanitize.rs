//! 章节标记清理
//!
//! 章节来自XHTML，但后续使用HTML解析器处理，需要先把XML特有的写法
//! 转换成HTML能正确理解的形式。

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// `<?xml ...?>`声明和其他处理指令
static PROLOG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<\?[^>]*\?>").unwrap());

/// `<!DOCTYPE ...>`，可能带内部子集
static DOCTYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<!DOCTYPE[^>\[]*(\[.*?\])?\s*>").unwrap());

/// 自闭合标签 `<tag .../>`
static SELF_CLOSING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([A-Za-z][\w:.-]*)((?:\s(?:[^<>"']|"[^"]*"|'[^']*')*?)?)\s*/>"#).unwrap());

/// 带前缀的元素 `<prefix:name` 或 `</prefix:name`
static NAMESPACED_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([A-Za-z][\w.-]*):([A-Za-z][\w.-]*)").unwrap());

/// 命名空间声明属性 `xmlns="..."` / `xmlns:x="..."`
static XMLNS_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s+xmlns(?::[\w.-]+)?\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap());

/// HTML空元素，自闭合写法保持不变
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// 去掉XML声明和文档类型声明
pub fn strip_prolog(markup: &str) -> String {
    let without_pi = PROLOG_RE.replace_all(markup, "");
    DOCTYPE_RE.replace_all(&without_pi, "").into_owned()
}

/// 把非空元素的自闭合写法展开为成对标签
///
/// HTML解析器会把`<div/>`当作开始标签，后面的兄弟节点因此被吞进去。
pub fn expand_self_closing(markup: &str) -> String {
    SELF_CLOSING_RE
        .replace_all(markup, |caps: &Captures| {
            let tag = &caps[1];
            if VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) {
                caps[0].to_string()
            } else {
                format!("<{}{}></{}>", tag, &caps[2], tag)
            }
        })
        .into_owned()
}

/// 把带前缀的元素改写为`div`，类名取`prefix-name`
pub fn rewrite_namespaced_elements(markup: &str) -> String {
    NAMESPACED_TAG_RE
        .replace_all(markup, |caps: &Captures| {
            if caps[1].is_empty() {
                format!(
                    "<div class=\"{}-{}\"",
                    caps[2].to_ascii_lowercase(),
                    caps[3].to_ascii_lowercase()
                )
            } else {
                "</div".to_string()
            }
        })
        .into_owned()
}

/// 去掉命名空间声明属性
pub fn drop_namespace_declarations(markup: &str) -> String {
    XMLNS_ATTR_RE.replace_all(markup, "").into_owned()
}

/// 解析前的预处理：去掉声明并展开自闭合标签
pub fn prepare_for_parsing(markup: &str) -> String {
    expand_self_closing(&strip_prolog(markup))
}

/// 清理序列化后的章节片段
pub fn sanitize_fragment(fragment: &str) -> String {
    let cleaned = strip_prolog(fragment);
    let cleaned = rewrite_namespaced_elements(&cleaned);
    drop_namespace_declarations(&cleaned).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_prolog() {
        let input = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n<html></html>";
        assert_eq!(strip_prolog(input).trim(), "<html></html>");
    }

    #[test]
    fn test_expand_self_closing_keeps_void_elements() {
        let input = r#"<div id="a"/><p>x</p><br/><img src="a.png" /><a id="n1"/>"#;
        let output = expand_self_closing(input);
        assert_eq!(
            output,
            r#"<div id="a"></div><p>x</p><br/><img src="a.png" /><a id="n1"></a>"#
        );
    }

    #[test]
    fn test_expand_self_closing_with_angle_bracket_in_attribute() {
        let input = r#"<span title="a > b"/><p>x</p>"#;
        assert_eq!(expand_self_closing(input), r#"<span title="a > b"></span><p>x</p>"#);
    }

    #[test]
    fn test_rewrite_namespaced_elements() {
        let input = r#"<epub:switch id="s"><epub:case required-namespace="x">A</epub:case></epub:switch>"#;
        let output = rewrite_namespaced_elements(input);
        assert_eq!(
            output,
            r#"<div class="epub-switch" id="s"><div class="epub-case" required-namespace="x">A</div></div>"#
        );
    }

    #[test]
    fn test_namespaced_attributes_are_kept() {
        let input = r#"<aside epub:type="footnote" xmlns:epub="http://www.idpf.org/2007/ops" xmlns="http://www.w3.org/1999/xhtml">n</aside>"#;
        let output = sanitize_fragment(input);
        assert_eq!(output, r#"<aside epub:type="footnote">n</aside>"#);
    }
}
