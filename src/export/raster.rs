//! Rasterizes rendered receipts to PNG with `resvg`.

use crate::render::RenderedDocument;
use crate::Result;
use anyhow::{anyhow, ensure, Context};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;
use std::sync::Arc;
use tracing::trace;

/// Converts a rendered document into PNG bytes at a pixel ratio.
#[async_trait::async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, document: &RenderedDocument, pixel_ratio: f32) -> Result<Vec<u8>>;
}

/// The production rasterizer. System fonts are loaded once and shared by every render.
#[derive(Clone)]
pub struct SvgRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl std::fmt::Debug for SvgRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgRasterizer")
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl Default for SvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SvgRasterizer {
    pub fn new() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        trace!("Loaded {} font faces", db.len());
        Self {
            fontdb: Arc::new(db),
        }
    }
}

#[async_trait::async_trait]
impl Rasterizer for SvgRasterizer {
    /// Parsing, rendering and encoding run on the blocking thread pool.
    async fn rasterize(&self, document: &RenderedDocument, pixel_ratio: f32) -> Result<Vec<u8>> {
        ensure!(
            pixel_ratio.is_finite() && pixel_ratio > 0.0,
            "Invalid pixel ratio {pixel_ratio}"
        );
        let fontdb = self.fontdb.clone();
        let document = document.clone();
        tokio::task::spawn_blocking(move || rasterize_blocking(fontdb, &document, pixel_ratio))
            .await
            .context("The rasterization task did not complete")?
    }
}

fn rasterize_blocking(
    fontdb: Arc<usvg::fontdb::Database>,
    document: &RenderedDocument,
    pixel_ratio: f32,
) -> Result<Vec<u8>> {
    let options = usvg::Options {
        fontdb,
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(document.svg(), &options)
        .context("Unable to parse the rendered receipt")?;

    let width = (document.width() as f32 * pixel_ratio).round() as u32;
    let height = (document.height() as f32 * pixel_ratio).round() as u32;
    let mut pixmap = Pixmap::new(width, height)
        .with_context(|| format!("Unable to allocate a {width}x{height} image"))?;
    resvg::render(
        &tree,
        Transform::from_scale(pixel_ratio, pixel_ratio),
        &mut pixmap.as_mut(),
    );
    pixmap
        .encode_png()
        .map_err(|e| anyhow!("Unable to encode PNG: {e}"))
}
