use crate::ai::AiClient;
use crate::args::SignatureArgs;
use crate::commands::Out;
use crate::{utils, Config, Mode, Result};
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;

const SIGNATURE_PNG: &str = "signature.png";

/// What `signature` produced.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureSummary {
    pub file: PathBuf,
    pub bytes: usize,
}

/// Generates a signature image and saves it, by default to `signature.png` in the output
/// directory.
pub async fn signature(
    config: &Config,
    mode: Mode,
    args: &SignatureArgs,
) -> Result<Out<SignatureSummary>> {
    let client = AiClient::from_config(config, mode)?;
    let image = client.generate_signature().await?;
    let file = args
        .out()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output_dir().join(SIGNATURE_PNG));
    utils::write(&file, image.data())
        .await
        .context("Unable to save the signature")?;
    Ok(Out::new(
        format!("Saved the signature to {}", file.display()),
        SignatureSummary {
            file,
            bytes: image.data().len(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_signature_default_location() {
        let env = TestEnv::new().await;
        let out = signature(&env.config(), Mode::Testing, &SignatureArgs::default())
            .await
            .unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.file, env.config().output_dir().join(SIGNATURE_PNG));
        let png = std::fs::read(&summary.file).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
        assert_eq!(png.len(), summary.bytes);
    }

    #[tokio::test]
    async fn test_signature_custom_location() {
        let env = TestEnv::new().await;
        let out_path = env.path().join("sig.png");
        let args = SignatureArgs::new(Some(out_path.clone()));
        let out = signature(&env.config(), Mode::Testing, &args).await.unwrap();
        assert_eq!(out.structure().unwrap().file, out_path);
        assert!(out_path.is_file());
    }
}
