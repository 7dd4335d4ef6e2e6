//! Implements the `GenAi` trait in memory for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without calling Gemini.

use crate::ai::{names_from_prompt, GenAi, ImageRequest, TextRequest};
use crate::model::{Amount, StudentDetails};
use crate::Result;
use anyhow::{anyhow, bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use resvg::tiny_skia::{Color, Paint, PathBuilder, Pixmap, Stroke, Transform};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CLASSES: &[&str] = &["Class V", "Class VIII", "Class X", "Class XII"];
const SUBJECTS: &[&str] = &["Science", "Commerce", "Computer Science", "Humanities"];
const FEES: &[(i64, &str)] = &[
    (15_000, "Fifteen Thousand Rupees Only"),
    (22_500, "Twenty-Two Thousand Five Hundred Rupees Only"),
    (30_000, "Thirty Thousand Rupees Only"),
    (48_000, "Forty-Eight Thousand Rupees Only"),
];
const MODES: &[(&str, &str)] = &[
    ("UPI", "Transaction ID: UPI"),
    ("Cash", "Paid in full"),
    ("Bank Transfer", "Reference No: NEFT"),
];

/// What `TestGenAi` answers with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TestBehavior {
    /// Details for exactly the names in the prompt, and a small generated PNG.
    #[default]
    Echo,
    /// The given text for every content request, and a small generated PNG.
    Fixed(String),
    /// Every request fails.
    Fail,
}

/// Counts the requests a `TestGenAi` has received. Clones share the counts.
#[derive(Debug, Clone, Default)]
pub struct TestCalls {
    text: Arc<AtomicUsize>,
    image: Arc<AtomicUsize>,
}

impl TestCalls {
    pub fn text(&self) -> usize {
        self.text.load(Ordering::SeqCst)
    }

    pub fn image(&self) -> usize {
        self.image.load(Ordering::SeqCst)
    }
}

/// A deterministic, in-memory stand-in for the generative AI service.
#[derive(Debug, Clone, Default)]
pub struct TestGenAi {
    behavior: TestBehavior,
    calls: TestCalls,
}

impl TestGenAi {
    pub fn new(behavior: TestBehavior) -> Self {
        Self {
            behavior,
            calls: TestCalls::default(),
        }
    }

    pub fn calls(&self) -> TestCalls {
        self.calls.clone()
    }
}

#[async_trait::async_trait]
impl GenAi for TestGenAi {
    async fn generate_content(&self, request: &TextRequest) -> Result<String> {
        self.calls.text.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            TestBehavior::Echo => {
                let names = names_from_prompt(&request.prompt)?;
                let details: Vec<StudentDetails> = names
                    .into_iter()
                    .enumerate()
                    .map(|(i, name)| echo_details(i, name))
                    .collect();
                serde_json::to_string(&details).context("Unable to serialize test details")
            }
            TestBehavior::Fixed(text) => Ok(text.clone()),
            TestBehavior::Fail => bail!("Test client is configured to fail"),
        }
    }

    async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>> {
        self.calls.image.fetch_add(1, Ordering::SeqCst);
        if self.behavior == TestBehavior::Fail {
            bail!("Test client is configured to fail");
        }
        let png = signature_png()?;
        Ok((0..request.count).map(|_| STANDARD.encode(&png)).collect())
    }
}

fn echo_details(i: usize, name: String) -> StudentDetails {
    let (fee, words) = FEES[i % FEES.len()];
    let (mode, details) = MODES[i % MODES.len()];
    let payment_details = match mode {
        "Cash" => details.to_string(),
        _ => format!("{details}{:09}", 123_456_789 + i),
    };
    StudentDetails {
        student_name: name,
        class_level: CLASSES[i % CLASSES.len()].to_string(),
        section: ["A", "B", "C"][i % 3].to_string(),
        roll_no: format!("S{}", 1001 + i),
        major_subject: SUBJECTS[i % SUBJECTS.len()].to_string(),
        amount: Amount::from_rupees(fee),
        amount_in_words: words.to_string(),
        payment_mode: mode.to_string(),
        payment_details,
    }
}

/// Draws a squiggle on a white 16:9 canvas.
fn signature_png() -> Result<Vec<u8>> {
    let mut pixmap = Pixmap::new(320, 180).context("Unable to allocate signature pixmap")?;
    pixmap.fill(Color::WHITE);
    let mut pb = PathBuilder::new();
    pb.move_to(30.0, 120.0);
    pb.cubic_to(80.0, 20.0, 120.0, 170.0, 170.0, 80.0);
    pb.cubic_to(200.0, 30.0, 240.0, 150.0, 290.0, 70.0);
    let path = pb.finish().context("Unable to build signature path")?;
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    paint.anti_alias = true;
    let stroke = Stroke {
        width: 4.0,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    pixmap
        .encode_png()
        .map_err(|e| anyhow!("Unable to encode signature PNG: {e}"))
}
