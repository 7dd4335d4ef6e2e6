//! The controller behind both user interfaces. It owns the receipt store, the shared logo and
//! signature, the student-name input, the loading flags and the error banner, and dispatches user
//! actions to the AI client, the renderer and the export pipeline.
//!
//! Every action clears the error banner when it starts. A failed action sets the banner, resets
//! its loading flag and leaves all other state as it was.

use crate::ai::AiClient;
use crate::error::ReceiptError;
use crate::export::{Exporter, SvgRasterizer};
use crate::model::{ImageRef, ReceiptField, ReceiptRecord, SchoolInfo};
use crate::render::{render, RenderedDocument};
use crate::store::ReceiptStore;
use crate::utils::parse_names;
use crate::{Config, Mode, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The state shown to the user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub receipts: Vec<ReceiptRecord>,
    pub selected_id: Option<String>,
    pub student_list: String,
    pub has_logo: bool,
    pub has_signature: bool,
    pub generating_signature: bool,
    pub batch_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Dashboard {
    ai: AiClient,
    exporter: Exporter,
    school: SchoolInfo,
    store: ReceiptStore,
    student_list: String,
    logo: Option<ImageRef>,
    signature: Option<ImageRef>,
    generating_signature: bool,
    batch_loading: bool,
    error: Option<String>,
}

impl Dashboard {
    /// Starts with a single default receipt, selected.
    pub fn new(ai: AiClient, exporter: Exporter, school: SchoolInfo, today: NaiveDate) -> Self {
        let store = ReceiptStore::new(ReceiptRecord::initial(&school, today));
        Self {
            ai,
            exporter,
            school,
            store,
            student_list: String::new(),
            logo: None,
            signature: None,
            generating_signature: false,
            batch_loading: false,
            error: None,
        }
    }

    /// Creates a dashboard that writes into the configured output directory.
    pub fn from_config(config: &Config, mode: Mode, today: NaiveDate) -> Result<Self> {
        let ai = AiClient::from_config(config, mode)?;
        let exporter = Exporter::new(SvgRasterizer::new(), config.output_dir());
        Ok(Self::new(ai, exporter, config.school(), today))
    }

    pub fn state(&self) -> DashboardState {
        DashboardState {
            receipts: self.store.receipts().to_vec(),
            selected_id: self.store.selected().map(|r| r.id.clone()),
            student_list: self.student_list.clone(),
            has_logo: self.logo.is_some(),
            has_signature: self.signature.is_some(),
            generating_signature: self.generating_signature,
            batch_loading: self.batch_loading,
            error: self.error.clone(),
        }
    }

    pub fn store(&self) -> &ReceiptStore {
        &self.store
    }

    pub fn selected(&self) -> Option<&ReceiptRecord> {
        self.store.selected()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn signature(&self) -> Option<&ImageRef> {
        self.signature.as_ref()
    }

    pub fn logo(&self) -> Option<&ImageRef> {
        self.logo.as_ref()
    }

    pub fn select(&mut self, id: &str) {
        self.error = None;
        self.store.select(id);
    }

    /// Edits one field of the receipt with `id`. Returns `false` if no receipt has that id.
    pub fn update_field(&mut self, id: &str, field: ReceiptField, value: &str) -> Result<bool> {
        self.error = None;
        self.store.update_field(id, field, value).inspect_err(|e| {
            self.error = Some(e.to_string());
        })
    }

    /// Edits one field of the selected receipt.
    pub fn update_selected(&mut self, field: ReceiptField, value: &str) -> Result<bool> {
        let Some(id) = self.store.selected().map(|r| r.id.clone()) else {
            return Ok(false);
        };
        self.update_field(&id, field, value)
    }

    /// Replaces the raw, newline-separated student-name input.
    pub fn set_student_list(&mut self, text: impl Into<String>) {
        self.student_list = text.into();
    }

    pub fn student_list(&self) -> &str {
        &self.student_list
    }

    /// Generates one receipt per name in the student list and replaces the receipt list with them,
    /// selecting the first. Returns the number of receipts generated.
    ///
    /// An empty list fails before any request is made.
    pub async fn batch_generate(
        &mut self,
        today: NaiveDate,
    ) -> std::result::Result<usize, ReceiptError> {
        self.error = None;
        let names = parse_names(&self.student_list);
        if names.is_empty() {
            return Err(self.fail(ReceiptError::NoStudentNames));
        }
        if self.batch_loading {
            return Err(self.fail(ReceiptError::Busy("Batch processing")));
        }

        self.batch_loading = true;
        info!("Generating receipts for {} students", names.len());
        let result = self.ai.generate_student_details(&names).await;
        self.batch_loading = false;

        let details = result.map_err(|e| self.fail(e))?;
        let school = self.batch_school();
        let records: Vec<ReceiptRecord> = details
            .into_iter()
            .enumerate()
            .map(|(i, detail)| ReceiptRecord::from_details(detail, i, &school, today))
            .collect();
        let count = records.len();
        self.store.replace_all(records);
        debug!("Replaced the receipt list with {count} receipts");
        Ok(count)
    }

    /// School details for a new batch: the selected receipt's, where not blank, else the defaults.
    fn batch_school(&self) -> SchoolInfo {
        let selected = self.store.selected();
        let pick = |value: Option<&String>, default: &String| match value {
            Some(v) if !v.is_empty() => v.clone(),
            _ => default.clone(),
        };
        SchoolInfo::new(
            pick(selected.map(|r| &r.school_address), &self.school.address),
            pick(selected.map(|r| &r.school_phone), &self.school.phone),
        )
    }

    /// Generates a signature and shares it across all receipts.
    pub async fn generate_signature(&mut self) -> std::result::Result<(), ReceiptError> {
        self.error = None;
        if self.generating_signature {
            return Err(self.fail(ReceiptError::Busy("Signature generation")));
        }
        self.generating_signature = true;
        let result = self.ai.generate_signature().await;
        self.generating_signature = false;
        let signature = result.map_err(|e| self.fail(e))?;
        self.signature = Some(signature);
        info!("Generated a new signature");
        Ok(())
    }

    /// Reads an image file and uses it as the logo on all receipts.
    pub async fn load_logo(&mut self, path: &Path) -> Result<()> {
        self.error = None;
        match ImageRef::from_file(path).await {
            Ok(logo) => {
                debug!("Loaded logo {logo:?}");
                self.logo = Some(logo);
                Ok(())
            }
            Err(e) => {
                self.error = Some(format!("Failed to load the logo: {e}"));
                Err(e)
            }
        }
    }

    pub fn remove_logo(&mut self) {
        self.error = None;
        self.logo = None;
    }

    /// Renders the selected receipt with the current logo and signature.
    pub fn render_selected(&self) -> Option<RenderedDocument> {
        self.store
            .selected()
            .map(|r| render(r, self.logo.as_ref(), self.signature.as_ref()))
    }

    /// Exports the selected receipt as a PNG and returns the path written.
    pub async fn download_single(&mut self) -> std::result::Result<PathBuf, ReceiptError> {
        self.error = None;
        let Some(record) = self.store.selected().cloned() else {
            return Err(self.fail(ReceiptError::NothingToExport));
        };
        if self.signature.is_none() {
            debug!("Exporting without a signature");
        }
        let document = render(&record, self.logo.as_ref(), self.signature.as_ref());
        let result = self.exporter.export_single(&document, &record).await;
        result.map_err(|e| self.fail(e))
    }

    /// Exports every receipt into one zip archive and returns the path written.
    pub async fn download_batch(
        &mut self,
        today: NaiveDate,
    ) -> std::result::Result<PathBuf, ReceiptError> {
        self.error = None;
        if self.store.is_empty() {
            return Err(self.fail(ReceiptError::NothingToExport));
        }
        if self.batch_loading {
            return Err(self.fail(ReceiptError::Busy("Batch processing")));
        }
        self.batch_loading = true;
        let records = self.store.receipts().to_vec();
        let documents: Vec<RenderedDocument> = records
            .iter()
            .map(|r| render(r, self.logo.as_ref(), self.signature.as_ref()))
            .collect();
        let result = self
            .exporter
            .export_batch(&documents, &records, today)
            .await;
        self.batch_loading = false;
        result.map_err(|e| self.fail(e))
    }

    fn fail(&mut self, e: ReceiptError) -> ReceiptError {
        warn!("{e}");
        self.error = Some(e.to_string());
        e
    }
}
