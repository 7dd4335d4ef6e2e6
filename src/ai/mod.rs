//! The AI client: synthesizes student details from a list of names and generates a signature
//! image.
//!
//! The HTTP transport sits behind the `GenAi` trait. `GeminiClient` talks to the Gemini REST API
//! and `TestGenAi` produces deterministic results in memory, which lets the whole program run
//! without the network when `Mode::Testing` is selected.

mod gemini;
mod test_client;

use crate::error::ReceiptError;
use crate::model::{ImageRef, StudentDetails, MAX_GENERATED_AMOUNT, MIN_GENERATED_AMOUNT};
use crate::{Config, Mode, Result};
use anyhow::{bail, ensure, Context};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

pub use gemini::{GeminiClient, GeminiError};
pub use test_client::{TestBehavior, TestCalls, TestGenAi};

/// The environment variable that holds the Gemini API key.
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

/// The line of the prompt that carries the submitted names as a JSON array.
pub(crate) const STUDENTS_MARKER: &str = "Students (JSON array): ";

const SIGNATURE_PROMPT: &str = "A sophisticated, flowing, handwritten signature for an official \
    school document. The signature should be illegible but look professional, like a principal's \
    signature. Black ink on a pure white background, isolated, no shadows.";

const SIGNATURE_MIME_TYPE: &str = "image/png";
const SIGNATURE_ASPECT_RATIO: &str = "16:9";

/// A structured text-generation request. The response must be JSON matching `response_schema`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub prompt: String,
    pub response_schema: Value,
}

/// An image-generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub count: u32,
    pub aspect_ratio: String,
    pub mime_type: String,
}

/// The generative AI service. Implementations make exactly one request per call and never retry.
#[async_trait::async_trait]
pub trait GenAi: Send + Sync {
    /// Returns the text of the first candidate.
    async fn generate_content(&self, request: &TextRequest) -> Result<String>;

    /// Returns the base64 payload of every generated image, in order.
    async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>>;
}

/// Wraps a `GenAi` implementation with the prompts, schema and validation for receipts.
///
/// Failures of either operation collapse into a single `ReceiptError`; the cause is logged.
pub struct AiClient {
    gen_ai: Box<dyn GenAi>,
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient").finish_non_exhaustive()
    }
}

impl AiClient {
    pub fn new(gen_ai: impl GenAi + 'static) -> Self {
        Self {
            gen_ai: Box::new(gen_ai),
        }
    }

    /// Creates the client for `mode`. In `Mode::Gemini` the API key is read from
    /// `GEMINI_API_KEY`.
    pub fn from_config(config: &Config, mode: Mode) -> Result<Self> {
        match mode {
            Mode::Gemini => {
                let api_key = std::env::var(GEMINI_API_KEY)
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .with_context(|| format!("{GEMINI_API_KEY} is not set"))?;
                Ok(Self::new(GeminiClient::new(
                    api_key,
                    config.api_base().clone(),
                    config.text_model(),
                    config.image_model(),
                )))
            }
            Mode::Testing => Ok(Self::new(TestGenAi::default())),
        }
    }

    /// Generates one `StudentDetails` per name, in the order the service returns them.
    ///
    /// Either the whole sequence is returned or `ReceiptError::StudentDetails`; there are no
    /// partial results. An empty `names` is rejected before any request is made.
    pub async fn generate_student_details(
        &self,
        names: &[String],
    ) -> std::result::Result<Vec<StudentDetails>, ReceiptError> {
        if names.is_empty() {
            return Err(ReceiptError::NoStudentNames);
        }
        self.request_student_details(names).await.map_err(|e| {
            error!("Error generating student details: {e:#}");
            ReceiptError::StudentDetails
        })
    }

    async fn request_student_details(&self, names: &[String]) -> Result<Vec<StudentDetails>> {
        let request = TextRequest {
            prompt: student_details_prompt(names)?,
            response_schema: student_details_schema(),
        };
        debug!("Requesting student details for {} names", names.len());
        let text = self.gen_ai.generate_content(&request).await?;
        let details = parse_student_details(&text)?;
        ensure!(
            details.len() == names.len(),
            "Expected details for {} students but received {}",
            names.len(),
            details.len()
        );
        for detail in &details {
            if !names.contains(&detail.student_name) {
                warn!(
                    "Generated details for '{}', which is not in the submitted list",
                    detail.student_name
                );
            }
        }
        Ok(details)
    }

    /// Generates a handwritten-style signature as a PNG.
    pub async fn generate_signature(&self) -> std::result::Result<ImageRef, ReceiptError> {
        self.request_signature().await.map_err(|e| {
            error!("Error generating signature: {e:#}");
            ReceiptError::Signature
        })
    }

    async fn request_signature(&self) -> Result<ImageRef> {
        let request = ImageRequest {
            prompt: SIGNATURE_PROMPT.to_string(),
            count: 1,
            aspect_ratio: SIGNATURE_ASPECT_RATIO.to_string(),
            mime_type: SIGNATURE_MIME_TYPE.to_string(),
        };
        let images = self.gen_ai.generate_images(&request).await?;
        let Some(first) = images.first() else {
            bail!("No image was generated");
        };
        ImageRef::from_base64(SIGNATURE_MIME_TYPE, first)
    }
}

fn student_details_prompt(names: &[String]) -> Result<String> {
    let names_json = serde_json::to_string(names).context("Unable to serialize student names")?;
    Ok(format!(
        "You are an administrative assistant for a school in India. Your task is to generate \
        tuition receipt details for a list of students.\n\
        Generate a JSON array where each object represents one student's details according to \
        the provided schema, one object per student, in the order given.\n\
        - Preserve the 'studentName' exactly as provided in the input list.\n\
        - All other generated fields should be in English and reflect a plausible Indian school \
        context.\n\
        - 'amount' is a tuition fee between {MIN_GENERATED_AMOUNT} and {MAX_GENERATED_AMOUNT} INR.\n\
        - 'amountInWords' must be the English language representation of the 'amount', ending \
        with \"Rupees Only\".\n\
        {STUDENTS_MARKER}{names_json}\n"
    ))
}

fn student_details_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "studentName": {
                    "type": "STRING",
                    "description": "The student's full name, preserving the original script from input."
                },
                "classLevel": { "type": "STRING", "description": "e.g., \"Class X\", \"Class XII\", \"Class V\"" },
                "section": { "type": "STRING", "description": "e.g., \"A\", \"B\", \"C\"" },
                "rollNo": { "type": "STRING", "description": "A unique roll number, e.g., 'S1234'" },
                "majorSubject": { "type": "STRING", "description": "e.g., \"Science\", \"Commerce\", \"Computer Science\"" },
                "amount": {
                    "type": "NUMBER",
                    "description": "A tuition fee between 10000 and 50000 INR.",
                    "minimum": MIN_GENERATED_AMOUNT,
                    "maximum": MAX_GENERATED_AMOUNT
                },
                "amountInWords": {
                    "type": "STRING",
                    "description": "The tuition fee in English words, e.g., \"Fifty Thousand Rupees Only\""
                },
                "paymentMode": { "type": "STRING", "description": "e.g., \"Cash\", \"Bank Transfer\", \"UPI\"" },
                "paymentDetails": { "type": "STRING", "description": "e.g., \"Paid in full\", \"Transaction ID: 12345\"" }
            },
            "required": [
                "studentName", "classLevel", "section", "rollNo", "majorSubject",
                "amount", "amountInWords", "paymentMode", "paymentDetails"
            ]
        }
    })
}

/// Parses the model's JSON text. A single object is accepted as a one-element sequence, since
/// the model sometimes answers that way when only one name was submitted.
fn parse_student_details(text: &str) -> Result<Vec<StudentDetails>> {
    let value: Value =
        serde_json::from_str(text.trim()).context("The response is not valid JSON")?;
    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => bail!("Expected a JSON array of student details, got {other}"),
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let details: StudentDetails = serde_json::from_value(item)
                .with_context(|| format!("Student details at index {i} do not match the schema"))?;
            details.validate()?;
            Ok(details)
        })
        .collect()
}

/// Extracts the submitted names from a prompt built by this module.
pub(crate) fn names_from_prompt(prompt: &str) -> Result<Vec<String>> {
    let line = prompt
        .lines()
        .find_map(|line| line.strip_prefix(STUDENTS_MARKER))
        .context("The prompt does not list any students")?;
    serde_json::from_str(line).context("The student list in the prompt is not a JSON array")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Amount;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_generate_two_students() {
        let gen_ai = TestGenAi::default();
        let calls = gen_ai.calls();
        let client = AiClient::new(gen_ai);
        let details = client
            .generate_student_details(&names(&["Sok Nea", "Bora Chan"]))
            .await
            .unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].student_name, "Sok Nea");
        assert_eq!(details[1].student_name, "Bora Chan");
        for d in &details {
            assert!(d.amount.is_within(MIN_GENERATED_AMOUNT, MAX_GENERATED_AMOUNT));
            assert!(d.amount_in_words.ends_with("Rupees Only"));
        }
        assert_eq!(calls.text(), 1);
    }

    #[tokio::test]
    async fn test_empty_names_make_no_request() {
        let gen_ai = TestGenAi::default();
        let calls = gen_ai.calls();
        let client = AiClient::new(gen_ai);
        let err = client.generate_student_details(&[]).await.unwrap_err();
        assert_eq!(err, ReceiptError::NoStudentNames);
        assert_eq!(calls.text(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_collapses() {
        let client = AiClient::new(TestGenAi::new(TestBehavior::Fail));
        let err = client
            .generate_student_details(&names(&["A"]))
            .await
            .unwrap_err();
        assert_eq!(err, ReceiptError::StudentDetails);
        assert_eq!(
            err.to_string(),
            "Failed to generate student details from AI."
        );
    }

    #[tokio::test]
    async fn test_count_mismatch_is_a_failure() {
        let one = r#"[{"studentName":"A","classLevel":"Class V","section":"A","rollNo":"S1",
            "majorSubject":"Science","amount":15000,"amountInWords":"Fifteen Thousand Rupees Only",
            "paymentMode":"Cash","paymentDetails":"Paid in full"}]"#;
        let client = AiClient::new(TestGenAi::new(TestBehavior::Fixed(one.to_string())));
        let err = client
            .generate_student_details(&names(&["A", "B"]))
            .await
            .unwrap_err();
        assert_eq!(err, ReceiptError::StudentDetails);
    }

    #[tokio::test]
    async fn test_single_object_is_normalized() {
        let one = r#"{"studentName":"A","classLevel":"Class V","section":"A","rollNo":"S1",
            "majorSubject":"Science","amount":15000,"amountInWords":"Fifteen Thousand Rupees Only",
            "paymentMode":"Cash","paymentDetails":"Paid in full"}"#;
        let client = AiClient::new(TestGenAi::new(TestBehavior::Fixed(one.to_string())));
        let details = client
            .generate_student_details(&names(&["A"]))
            .await
            .unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].amount, Amount::from_rupees(15000));
    }

    #[tokio::test]
    async fn test_schema_violation_is_a_failure() {
        let bad = r#"[{"studentName":"A"}]"#;
        let client = AiClient::new(TestGenAi::new(TestBehavior::Fixed(bad.to_string())));
        assert_eq!(
            client
                .generate_student_details(&names(&["A"]))
                .await
                .unwrap_err(),
            ReceiptError::StudentDetails
        );

        let not_json = "Sorry, I cannot help with that.";
        let client = AiClient::new(TestGenAi::new(TestBehavior::Fixed(not_json.to_string())));
        assert!(client
            .generate_student_details(&names(&["A"]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_amount_is_a_failure() {
        let high = r#"[{"studentName":"A","classLevel":"Class V","section":"A","rollNo":"S1",
            "majorSubject":"Science","amount":90000,"amountInWords":"Ninety Thousand Rupees Only",
            "paymentMode":"Cash","paymentDetails":"Paid in full"}]"#;
        let client = AiClient::new(TestGenAi::new(TestBehavior::Fixed(high.to_string())));
        assert!(client
            .generate_student_details(&names(&["A"]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_generate_signature() {
        let gen_ai = TestGenAi::default();
        let calls = gen_ai.calls();
        let client = AiClient::new(gen_ai);
        let signature = client.generate_signature().await.unwrap();
        assert_eq!(signature.mime_type(), "image/png");
        assert!(signature.data().starts_with(b"\x89PNG"));
        assert_eq!(calls.image(), 1);
    }

    #[tokio::test]
    async fn test_signature_failure_collapses() {
        let client = AiClient::new(TestGenAi::new(TestBehavior::Fail));
        let err = client.generate_signature().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to generate AI signature.");
    }

    #[test]
    fn test_prompt_round_trips_names() {
        let input = names(&["Sok Nea", "Ананья \"Ana\" Rao"]);
        let prompt = student_details_prompt(&input).unwrap();
        assert!(prompt.contains("Rupees Only"));
        assert_eq!(names_from_prompt(&prompt).unwrap(), input);
    }
}
