use crate::commands::Out;
use crate::dashboard::Dashboard;
use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData;
use serde::Serialize;
use std::fmt::Debug;
use tracing::error;

pub(super) fn to_content<T>(out: Out<T>) -> Vec<Content>
where
    T: Debug + Clone + Serialize,
{
    let mut content = vec![Content::text(out.message())];
    if let Some(object) = out.structure() {
        match Content::json(object) {
            Ok(json) => content.push(json),
            Err(e) => error!("Unable to serialize JSON output: {e}"),
        };
    }
    content
}

pub(super) fn tool_result<T>(result: crate::Result<Out<T>>) -> Result<CallToolResult, ErrorData>
where
    T: Debug + Clone + Serialize,
{
    Ok(match result {
        Ok(out) => CallToolResult::success(to_content(out)),
        Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
    })
}

/// Wraps the outcome of a dashboard action. On success the dashboard state follows the message so
/// the agent always sees the receipts, the selection and any loading flags after each action.
pub(super) fn state_result<E>(
    dashboard: &Dashboard,
    result: Result<String, E>,
) -> Result<CallToolResult, ErrorData>
where
    E: Into<anyhow::Error>,
{
    tool_result(
        result
            .map(|message| Out::new(message, dashboard.state()))
            .map_err(Into::into),
    )
}
