use crate::args::BatchArgs;
use crate::commands::Out;
use crate::dashboard::Dashboard;
use crate::model::ReceiptRecord;
use crate::{utils, Config, Mode, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

/// What `batch` produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub archive: PathBuf,
    pub signed: bool,
    pub receipts: Vec<ReceiptRecord>,
}

/// Generates one receipt per student name and exports them as a zip archive.
///
/// Names come from `--names-file` or from `--name`. A signature is generated unless
/// `--no-signature` is given; if that fails the receipts are exported with the placeholder.
pub async fn batch(
    config: &Config,
    mode: Mode,
    args: &BatchArgs,
    today: NaiveDate,
) -> Result<Out<BatchSummary>> {
    let student_list = match args.names_file() {
        Some(path) => utils::read(path).await?,
        None => args.names().join("\n"),
    };

    let mut dashboard = Dashboard::from_config(config, mode, today)?;
    dashboard.set_student_list(student_list);
    if let Some(logo) = args.logo() {
        dashboard.load_logo(logo).await?;
    }
    let count = dashboard.batch_generate(today).await?;

    if !args.no_signature() {
        if let Err(e) = dashboard.generate_signature().await {
            warn!("{e} The receipts will show a placeholder instead.");
        }
    }

    let archive = dashboard.download_batch(today).await?;
    Ok(Out::new(
        format!("Exported {count} receipts to {}", archive.display()),
        BatchSummary {
            archive,
            signed: dashboard.signature().is_some(),
            receipts: dashboard.store().receipts().to_vec(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_batch_from_names_file() {
        let env = TestEnv::new().await;
        let names_file = env.path().join("names.txt");
        utils::write(&names_file, "Sok Nea\n\nBora Chan\nAnanya Rao\n")
            .await
            .unwrap();
        let args = BatchArgs::new(Some(names_file), Vec::new(), None, false);

        let out = batch(&env.config(), Mode::Testing, &args, env.today())
            .await
            .unwrap();

        let summary = out.structure().unwrap();
        assert_eq!(summary.receipts.len(), 3);
        assert!(summary.signed);
        assert!(summary.archive.starts_with(env.config().output_dir()));
        let archive =
            zip::ZipArchive::new(Cursor::new(std::fs::read(&summary.archive).unwrap())).unwrap();
        assert_eq!(archive.len(), 3);
    }

    #[tokio::test]
    async fn test_batch_requires_names() {
        let env = TestEnv::new().await;
        let args = BatchArgs::new(None, Vec::new(), None, true);
        let err = batch(&env.config(), Mode::Testing, &args, env.today())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please enter at least one student name for batch generation."
        );
    }
}
