use crate::args::SingleArgs;
use crate::commands::Out;
use crate::dashboard::Dashboard;
use crate::model::ReceiptRecord;
use crate::{Config, Mode, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

/// What `single` produced.
#[derive(Debug, Clone, Serialize)]
pub struct SingleSummary {
    pub file: PathBuf,
    pub signed: bool,
    pub receipt: ReceiptRecord,
}

/// Applies the `--set` edits to the default receipt and exports it as one PNG.
pub async fn single(
    config: &Config,
    mode: Mode,
    args: &SingleArgs,
    today: NaiveDate,
) -> Result<Out<SingleSummary>> {
    let mut dashboard = Dashboard::from_config(config, mode, today)?;
    for edit in args.sets() {
        dashboard.update_selected(edit.field(), edit.value())?;
    }
    if let Some(logo) = args.logo() {
        dashboard.load_logo(logo).await?;
    }
    if !args.no_signature() {
        if let Err(e) = dashboard.generate_signature().await {
            warn!("{e} The receipt will show a placeholder instead.");
        }
    }

    let file = dashboard.download_single().await?;
    let receipt = dashboard
        .selected()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("The receipt disappeared during export"))?;
    Ok(Out::new(
        format!("Exported the receipt to {}", file.display()),
        SingleSummary {
            file,
            signed: dashboard.signature().is_some(),
            receipt,
        },
    ))
}
