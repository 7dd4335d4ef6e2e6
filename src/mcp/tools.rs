//! The receipt editor tools exposed over MCP.

use crate::commands::Out;
use crate::mcp::mcp_utils::{state_result, tool_result};
use crate::mcp::ReceiptServer;
use crate::model::ReceiptField;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::ErrorData as McpError;
use rmcp::{tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Parameters for the select_receipt tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(title = "SelectReceiptParams")]
pub struct SelectReceiptParams {
    /// The `id` of the receipt to select.
    pub id: String,
}

/// Parameters for the update_field tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(title = "UpdateFieldParams")]
pub struct UpdateFieldParams {
    /// The `id` of the receipt to edit.
    pub id: String,

    /// The field to replace.
    pub field: ReceiptField,

    /// The new value. `issueDate` must be `YYYY-MM-DD` and `amount` must be a number, optionally
    /// with commas or a rupee sign.
    pub value: String,
}

/// Parameters for the set_student_list tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "SetStudentListParams")]
pub struct SetStudentListParams {
    /// Student names, one per line. Blank lines are ignored.
    pub student_list: String,
}

/// Parameters for the set_logo tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(title = "SetLogoParams")]
pub struct SetLogoParams {
    /// Path to an image file on the machine running the server.
    pub path: PathBuf,
}

#[tool_router(vis = "pub(super)")]
impl ReceiptServer {
    #[tool]
    /// Initialize the receipts MCP service for this session and return usage instructions. You
    /// **MUST** call this **ONCE** before using other tools so that you have the full usage
    /// instructions. You **MAY** call it more than once if you have forgotten the usage
    /// instructions.
    ///
    /// The first call also generates the shared signature. If that fails the session starts
    /// unsigned and the failure is shown in the `error` field of the state.
    async fn initialize_service(&self) -> Result<CallToolResult, McpError> {
        info!("MCP: initialize_service called in {:?} mode", self.mode);
        let first_call = {
            let mut initialized = self.initialized.lock().await;
            let first_call = !*initialized;
            *initialized = true;
            first_call
        };
        if first_call {
            let mut dashboard = self.dashboard.lock().await;
            if dashboard.generate_signature().await.is_err() {
                warn!("Starting the session without a signature");
            }
        }
        Ok(CallToolResult::success(vec![rmcp::model::Content::text(
            include_str!("docs/INSTRUCTIONS.md"),
        )]))
    }

    /// Return the current editor state: all receipts, the selected receipt id, the student list,
    /// whether a logo and a signature are set, the loading flags and the error banner.
    #[tool]
    async fn get_state(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        let dashboard = self.dashboard.lock().await;
        state_result(&dashboard, Ok::<_, anyhow::Error>(receipt_count(&dashboard)))
    }

    /// Make the receipt with the given `id` the selected one. The selected receipt is the one
    /// `render_receipt` and `download_receipt` operate on. An unknown id leaves the selection as
    /// it was.
    #[tool]
    async fn select_receipt(
        &self,
        Parameters(params): Parameters<SelectReceiptParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: select_receipt called with id={}", params.id);
        let mut dashboard = self.dashboard.lock().await;
        dashboard.select(&params.id);
        let message = match dashboard.selected() {
            Some(r) if r.id == params.id => format!("Selected the receipt for {}", r.student_name),
            _ => format!("No receipt has the id '{}'", params.id),
        };
        state_result(&dashboard, Ok::<_, anyhow::Error>(message))
    }

    /// Replace one field of one receipt. Other receipts and other fields are unchanged. If the
    /// value cannot be parsed for the field, the receipt is left as it was and an error is
    /// returned.
    ///
    /// # Example
    ///
    /// ```json
    /// {
    ///   "id": "4b1c...",
    ///   "field": "amountInWords",
    ///   "value": "Twelve Thousand Five Hundred Rupees Only"
    /// }
    /// ```
    #[tool]
    async fn update_field(
        &self,
        Parameters(params): Parameters<UpdateFieldParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!(
            "MCP: update_field called with id={}, field={}",
            params.id, params.field
        );
        let mut dashboard = self.dashboard.lock().await;
        let result = dashboard
            .update_field(&params.id, params.field, &params.value)
            .map(|found| {
                if found {
                    format!("Updated {} on receipt {}", params.field, params.id)
                } else {
                    format!("No receipt has the id '{}'", params.id)
                }
            });
        state_result(&dashboard, result)
    }

    /// Replace the student-name input used by `batch_generate`. Put one name per line.
    #[tool]
    async fn set_student_list(
        &self,
        Parameters(params): Parameters<SetStudentListParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        let mut dashboard = self.dashboard.lock().await;
        dashboard.set_student_list(params.student_list);
        let count = crate::parse_names(dashboard.student_list()).len();
        state_result(
            &dashboard,
            Ok::<_, anyhow::Error>(format!("The student list has {count} names")),
        )
    }

    /// Ask the AI to invent plausible details (class, section, roll number, subject, fee, payment
    /// mode) for every name in the student list, then replace ALL receipts with one new receipt
    /// per name and select the first. Any edits to the previous receipts are discarded. If the AI
    /// call fails, the receipts are left unchanged.
    #[tool]
    async fn batch_generate(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: batch_generate called");
        let mut dashboard = self.dashboard.lock().await;
        let result = dashboard
            .batch_generate(Self::today())
            .await
            .map(|count| format!("Generated {count} receipts"));
        state_result(&dashboard, result)
    }

    /// Ask the AI to draw a handwritten signature. It is shared by every receipt. On failure any
    /// previous signature is kept.
    #[tool]
    async fn generate_signature(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: generate_signature called");
        let mut dashboard = self.dashboard.lock().await;
        let result = dashboard
            .generate_signature()
            .await
            .map(|_| "Generated a new signature".to_string());
        state_result(&dashboard, result)
    }

    /// Use an image file as the school logo on every receipt.
    #[tool]
    async fn set_logo(
        &self,
        Parameters(params): Parameters<SetLogoParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: set_logo called with path={}", params.path.display());
        let mut dashboard = self.dashboard.lock().await;
        let result = dashboard
            .load_logo(&params.path)
            .await
            .map(|_| format!("Using {} as the logo", params.path.display()));
        state_result(&dashboard, result)
    }

    /// Remove the school logo from every receipt.
    #[tool]
    async fn remove_logo(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        let mut dashboard = self.dashboard.lock().await;
        dashboard.remove_logo();
        state_result(&dashboard, Ok::<_, anyhow::Error>("Removed the logo".to_string()))
    }

    /// Render the selected receipt and return it as SVG markup with its width and height in
    /// pixels. Nothing is written to disk.
    #[tool]
    async fn render_receipt(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        let dashboard = self.dashboard.lock().await;
        let out = dashboard
            .render_selected()
            .map(|document| Out::new("Rendered the selected receipt", document))
            .ok_or_else(|| anyhow::anyhow!(crate::ReceiptError::NothingToExport));
        tool_result(out)
    }

    /// Export the selected receipt as a high-resolution PNG into the output directory and return
    /// the path of the file.
    #[tool]
    async fn download_receipt(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: download_receipt called");
        let mut dashboard = self.dashboard.lock().await;
        let result = dashboard
            .download_single()
            .await
            .map(|path| format!("Saved the receipt to {}", path.display()));
        state_result(&dashboard, result)
    }

    /// Export every receipt as a PNG inside one zip archive in the output directory and return
    /// the path of the archive. Nothing is written if any receipt fails.
    #[tool]
    async fn download_batch(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: download_batch called");
        let mut dashboard = self.dashboard.lock().await;
        let result = dashboard.download_batch(Self::today()).await;
        let count = dashboard.store().len();
        let result = result.map(|path| {
            format!(
                "Saved {count} receipts to {} in {}",
                path.file_name().unwrap_or_default().to_string_lossy(),
                self.config.output_dir().display()
            )
        });
        state_result(&dashboard, result)
    }
}

fn receipt_count(dashboard: &crate::dashboard::Dashboard) -> String {
    match dashboard.store().len() {
        1 => "There is 1 receipt".to_string(),
        n => format!("There are {n} receipts"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiClient, TestBehavior, TestCalls, TestGenAi};
    use crate::dashboard::Dashboard;
    use crate::export::{Exporter, SvgRasterizer};
    use crate::test::TestEnv;
    use crate::Mode;

    fn server(env: &TestEnv, behavior: TestBehavior) -> (ReceiptServer, TestCalls) {
        let gen_ai = TestGenAi::new(behavior);
        let calls = gen_ai.calls();
        let config = env.config();
        let dashboard = Dashboard::new(
            AiClient::new(gen_ai),
            Exporter::new(SvgRasterizer::new(), config.output_dir()),
            config.school(),
            env.today(),
        );
        (ReceiptServer::new(config, Mode::Testing, dashboard), calls)
    }

    #[tokio::test]
    async fn test_initialize_generates_signature_once() {
        let env = TestEnv::new().await;
        let (server, calls) = server(&env, TestBehavior::Echo);

        let first = server.initialize_service().await.unwrap();
        assert!(!first.is_error.unwrap_or(false));
        assert!(server.dashboard.lock().await.signature().is_some());

        let again = server.initialize_service().await.unwrap();
        assert!(!again.is_error.unwrap_or(false));
        assert_eq!(calls.image(), 1);
    }

    #[tokio::test]
    async fn test_initialize_survives_signature_failure() {
        let env = TestEnv::new().await;
        let (server, calls) = server(&env, TestBehavior::Fail);

        let result = server.initialize_service().await.unwrap();

        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(calls.image(), 1);
        let dashboard = server.dashboard.lock().await;
        assert!(dashboard.signature().is_none());
        assert!(!dashboard.state().generating_signature);
        assert_eq!(dashboard.error(), Some("Failed to generate AI signature."));
        drop(dashboard);
        assert!(server.check_initialized().await);
    }
}
