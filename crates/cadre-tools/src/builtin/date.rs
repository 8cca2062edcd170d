use futures::future::BoxFuture;
use serde_json::json;

use cadre_core::error::Result;
use cadre_core::traits::Tool;
use cadre_core::types::ToolResult;

/// Reports today's date in the local timezone.
pub struct CurrentDateTool;

pub(crate) fn format_date(date: chrono::NaiveDate) -> String {
    format!("The current date is: {}", date.format("%d %B %Y"))
}

impl Tool for CurrentDateTool {
    fn name(&self) -> &str {
        "get_current_date"
    }

    fn description(&self) -> &str {
        "Get the current date. Use this whenever a question depends on today's date."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    fn execute(&self, _input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let today = chrono::Local::now().date_naive();
            Ok(ToolResult::success(format_date(today)))
        })
    }

    fn timeout_secs(&self) -> u64 {
        5
    }
}
