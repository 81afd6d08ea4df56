//! JSON_PATH body matcher: matches when the path selects at least one node.

use super::difference::MatchDifference;
use serde_json::Value;
use serde_json_path::JsonPath;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JsonPathMatcher {
    expression: String,
    path: Result<Arc<JsonPath>, String>,
}

impl JsonPathMatcher {
    pub fn new(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        let path = JsonPath::parse(&expression)
            .map(Arc::new)
            .map_err(|e| format!("invalid json path [{expression}]: {e}"));
        Self { expression, path }
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: &str) -> bool {
        let path = match &self.path {
            Ok(path) => path,
            Err(e) => {
                debug!("{}", e);
                if let Some(ctx) = context {
                    ctx.add(e.clone());
                }
                return false;
            }
        };

        let document: Value = match serde_json::from_str(matched) {
            Ok(v) => v,
            Err(e) => {
                if let Some(ctx) = context {
                    ctx.add(format!("failed to parse body as JSON: {e}"));
                }
                return false;
            }
        };

        let found = !path.query(&document).is_empty();
        if !found {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "json path match failed expected:\n  {}\n found no match in:\n  {}",
                    self.expression, document
                ));
            }
        }
        found
    }
}
