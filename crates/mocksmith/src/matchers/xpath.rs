//! XPATH body matcher.
//!
//! The expression is evaluated against the body and converted to a boolean the
//! way XPath's `boolean()` does: a non-empty node set, `true`, a non-zero
//! number or a non-empty string all match.

use super::difference::MatchDifference;
use sxd_document::parser;
use sxd_xpath::{evaluate_xpath, Value};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct XPathMatcher {
    expression: String,
}

impl XPathMatcher {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: &str) -> bool {
        let package = match parser::parse(matched) {
            Ok(package) => package,
            Err(e) => {
                if let Some(ctx) = context {
                    ctx.add(format!("failed to parse body as XML: {e:?}"));
                }
                return false;
            }
        };
        let document = package.as_document();

        let result = match evaluate_xpath(&document, &self.expression) {
            Ok(Value::Nodeset(nodes)) => nodes.iter().next().is_some(),
            Ok(Value::Boolean(b)) => b,
            Ok(Value::Number(n)) => n != 0.0 && !n.is_nan(),
            Ok(Value::String(s)) => !s.is_empty(),
            Err(e) => {
                debug!("error evaluating xpath [{}]: {:?}", self.expression, e);
                if let Some(ctx) = context {
                    ctx.add(format!("xpath [{}] could not be evaluated: {e:?}", self.expression));
                }
                return false;
            }
        };

        if !result {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "xpath match failed expected:\n  {}\n found no match in:\n  {}",
                    self.expression, matched
                ));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOKSTORE: &str = r#"<bookstore>
        <book category="COOKING"><title>Everyday Italian</title><price>30.00</price></book>
        <book category="WEB"><title>Learning XML</title><price>39.95</price></book>
    </bookstore>"#;

    #[test]
    fn test_nodeset_predicate() {
        assert!(XPathMatcher::new("/bookstore/book[price>35]/price").matches(None, BOOKSTORE));
        assert!(!XPathMatcher::new("/bookstore/book[price>40]/price").matches(None, BOOKSTORE));
    }

    #[test]
    fn test_boolean_and_number_results() {
        assert!(XPathMatcher::new("count(/bookstore/book) = 2").matches(None, BOOKSTORE));
        assert!(!XPathMatcher::new("count(/bookstore/magazine)").matches(None, BOOKSTORE));
    }

    #[test]
    fn test_errors_are_mismatches() {
        assert!(!XPathMatcher::new("/bookstore[").matches(None, BOOKSTORE));
        assert!(!XPathMatcher::new("/a").matches(None, "{\"json\": true}"));
    }
}
