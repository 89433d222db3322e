//! 页面结构抽象
//!
//! 解析器只依赖“按 id 找元素、按名字读属性”这一能力，
//! 任意 HTML 解析实现都可以接入

use super::types::ExtractionError;
use scraper::{ElementRef, Html};

/// 属性查找结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeLookup<'a> {
    /// 没有对应 id 的元素
    ElementMissing,
    /// 元素存在但没有该属性
    AttributeMissing,
    /// 属性值（可能为空字符串）
    Value(&'a str),
}

/// 可查询的标记文档
pub trait MarkupDocument {
    fn attribute_by_id(&self, element_id: &str, attribute: &str) -> AttributeLookup<'_>;
}

/// 基于 scraper 的 HTML 文档
///
/// `Html` 不是 Send，只能在同步代码中创建和使用，不要跨 await 持有
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }
}

impl MarkupDocument for HtmlDocument {
    fn attribute_by_id(&self, element_id: &str, attribute: &str) -> AttributeLookup<'_> {
        let element = self
            .html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().id() == Some(element_id));

        match element {
            None => AttributeLookup::ElementMissing,
            Some(el) => match el.value().attr(attribute) {
                None => AttributeLookup::AttributeMissing,
                Some(value) => AttributeLookup::Value(value),
            },
        }
    }
}

/// 直链位置：元素 id + 属性名
#[derive(Debug, Clone)]
pub struct LinkSelector {
    pub element_id: String,
    pub attribute: String,
}

impl LinkSelector {
    pub fn new(element_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            attribute: attribute.into(),
        }
    }

    /// 从文档中取出直链原文（已去除首尾空白）
    pub fn extract<'a, D: MarkupDocument>(&self, doc: &'a D) -> Result<&'a str, ExtractionError> {
        match doc.attribute_by_id(&self.element_id, &self.attribute) {
            AttributeLookup::ElementMissing => Err(ExtractionError::ElementMissing {
                element_id: self.element_id.clone(),
            }),
            AttributeLookup::AttributeMissing => Err(ExtractionError::AttributeMissing {
                element_id: self.element_id.clone(),
                attribute: self.attribute.clone(),
            }),
            AttributeLookup::Value(v) if v.trim().is_empty() => {
                Err(ExtractionError::AttributeEmpty {
                    element_id: self.element_id.clone(),
                    attribute: self.attribute.clone(),
                })
            }
            AttributeLookup::Value(v) => Ok(v.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> LinkSelector {
        LinkSelector::new("downloadButton", "href")
    }

    #[test]
    fn test_extract_found() {
        let doc = HtmlDocument::parse(
            r#"<html><body>
                <a class="input popsok" id="downloadButton"
                   href=" https://download123.example.com/abc/file.mp4 ">Download</a>
            </body></html>"#,
        );
        assert_eq!(
            selector().extract(&doc),
            Ok("https://download123.example.com/abc/file.mp4")
        );
    }

    #[test]
    fn test_extract_element_missing() {
        let doc = HtmlDocument::parse("<html><body><p>The file you requested has been deleted.</p></body></html>");
        assert_eq!(
            selector().extract(&doc),
            Err(ExtractionError::ElementMissing {
                element_id: "downloadButton".to_string()
            })
        );
    }

    #[test]
    fn test_extract_attribute_missing() {
        let doc = HtmlDocument::parse(r#"<a id="downloadButton">Download</a>"#);
        assert!(matches!(
            selector().extract(&doc),
            Err(ExtractionError::AttributeMissing { .. })
        ));
    }

    #[test]
    fn test_extract_attribute_empty() {
        let doc = HtmlDocument::parse(r#"<a id="downloadButton" href="   ">Download</a>"#);
        assert!(matches!(
            selector().extract(&doc),
            Err(ExtractionError::AttributeEmpty { .. })
        ));
    }

    #[test]
    fn test_id_match_is_exact() {
        let doc = HtmlDocument::parse(r#"<a id="downloadButton2" href="https://x/y">x</a>"#);
        assert_eq!(doc.attribute_by_id("downloadButton", "href"), AttributeLookup::ElementMissing);
    }
}
