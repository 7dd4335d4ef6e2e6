//! The tuition receipt record and the AI-generated student details it is built from.

use crate::model::Amount;
use crate::Result;
use anyhow::{anyhow, ensure, Context};
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The lowest tuition fee the AI is asked to produce.
pub const MIN_GENERATED_AMOUNT: i64 = 10_000;

/// The highest tuition fee the AI is asked to produce.
pub const MAX_GENERATED_AMOUNT: i64 = 50_000;

/// The format in which `issueDate` is accepted and stored.
const DATE_FORMAT: &str = "%Y-%m-%d";

const PAYMENT_FOR: &str = "Annual Tuition Fees";

/// Institution details that are copied onto every receipt.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SchoolInfo {
    pub address: String,
    pub phone: String,
}

impl SchoolInfo {
    pub fn new(address: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            phone: phone.into(),
        }
    }
}

/// One tuition receipt.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
    pub id: String,
    pub receipt_no: String,
    pub issue_date: NaiveDate,
    pub academic_year: String,
    pub school_address: String,
    pub school_phone: String,
    pub received_from: String,
    pub student_name: String,
    pub class_level: String,
    pub section: String,
    pub roll_no: String,
    pub major_subject: String,
    pub payment_for: String,
    pub amount: Amount,
    pub amount_in_words: String,
    pub payment_mode: String,
    pub payment_details: String,
}

impl ReceiptRecord {
    /// The record that exists before anything has been generated.
    pub fn initial(school: &SchoolInfo, today: NaiveDate) -> Self {
        let receipt_no = format!("R{}", rand::thread_rng().gen_range(1000..=9999));
        Self {
            id: new_id(),
            receipt_no,
            issue_date: today,
            academic_year: academic_year(today.year()),
            school_address: school.address.clone(),
            school_phone: school.phone.clone(),
            received_from: "Priya Sharma".to_string(),
            student_name: "Aarav Sharma".to_string(),
            class_level: "Class X".to_string(),
            section: "A".to_string(),
            roll_no: "S1024".to_string(),
            major_subject: "Science".to_string(),
            payment_for: PAYMENT_FOR.to_string(),
            amount: Amount::from_rupees(50_000),
            amount_in_words: "Fifty Thousand Rupees Only".to_string(),
            payment_mode: "UPI".to_string(),
            payment_details: "Transaction ID: UPI123456789".to_string(),
        }
    }

    /// Builds the `index`-th record of a batch from AI-generated details.
    ///
    /// The receipt number is random and may collide with another record's.
    pub fn from_details(
        details: StudentDetails,
        index: usize,
        school: &SchoolInfo,
        today: NaiveDate,
    ) -> Self {
        let base: usize = rand::thread_rng().gen_range(10_000..=99_999);
        let received_from = details
            .student_name
            .split_whitespace()
            .last()
            .unwrap_or(&details.student_name)
            .to_string();
        Self {
            id: new_id(),
            receipt_no: format!("R{}", base + index),
            issue_date: today,
            academic_year: academic_year(today.year()),
            school_address: school.address.clone(),
            school_phone: school.phone.clone(),
            received_from,
            student_name: details.student_name,
            class_level: details.class_level,
            section: details.section,
            roll_no: details.roll_no,
            major_subject: details.major_subject,
            payment_for: PAYMENT_FOR.to_string(),
            amount: details.amount,
            amount_in_words: details.amount_in_words,
            payment_mode: details.payment_mode,
            payment_details: details.payment_details,
        }
    }

    /// The school details carried by this record.
    pub fn school(&self) -> SchoolInfo {
        SchoolInfo::new(&self.school_address, &self.school_phone)
    }

    /// Replaces one field with a value parsed from `value`. On error the record is unchanged.
    pub fn set(&mut self, field: ReceiptField, value: &str) -> Result<()> {
        let text = value.to_string();
        match field {
            ReceiptField::ReceiptNo => self.receipt_no = text,
            ReceiptField::IssueDate => {
                self.issue_date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
                    .with_context(|| format!("Invalid issue date '{value}', expected YYYY-MM-DD"))?
            }
            ReceiptField::AcademicYear => self.academic_year = text,
            ReceiptField::SchoolAddress => self.school_address = text,
            ReceiptField::SchoolPhone => self.school_phone = text,
            ReceiptField::ReceivedFrom => self.received_from = text,
            ReceiptField::StudentName => self.student_name = text,
            ReceiptField::ClassLevel => self.class_level = text,
            ReceiptField::Section => self.section = text,
            ReceiptField::RollNo => self.roll_no = text,
            ReceiptField::MajorSubject => self.major_subject = text,
            ReceiptField::PaymentFor => self.payment_for = text,
            ReceiptField::Amount => {
                self.amount = Amount::from_str(value)
                    .map_err(|e| anyhow!("Invalid amount '{value}': {e}"))?
            }
            ReceiptField::AmountInWords => self.amount_in_words = text,
            ReceiptField::PaymentMode => self.payment_mode = text,
            ReceiptField::PaymentDetails => self.payment_details = text,
        }
        Ok(())
    }

    /// Returns the value of one field as text, in the form `set` accepts.
    pub fn get(&self, field: ReceiptField) -> String {
        match field {
            ReceiptField::ReceiptNo => self.receipt_no.clone(),
            ReceiptField::IssueDate => self.issue_date.format(DATE_FORMAT).to_string(),
            ReceiptField::AcademicYear => self.academic_year.clone(),
            ReceiptField::SchoolAddress => self.school_address.clone(),
            ReceiptField::SchoolPhone => self.school_phone.clone(),
            ReceiptField::ReceivedFrom => self.received_from.clone(),
            ReceiptField::StudentName => self.student_name.clone(),
            ReceiptField::ClassLevel => self.class_level.clone(),
            ReceiptField::Section => self.section.clone(),
            ReceiptField::RollNo => self.roll_no.clone(),
            ReceiptField::MajorSubject => self.major_subject.clone(),
            ReceiptField::PaymentFor => self.payment_for.clone(),
            ReceiptField::Amount => self.amount.value().to_string(),
            ReceiptField::AmountInWords => self.amount_in_words.clone(),
            ReceiptField::PaymentMode => self.payment_mode.clone(),
            ReceiptField::PaymentDetails => self.payment_details.clone(),
        }
    }
}

/// The editable fields of a `ReceiptRecord`. The `id` is not editable.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum ReceiptField {
    ReceiptNo,
    IssueDate,
    AcademicYear,
    SchoolAddress,
    SchoolPhone,
    ReceivedFrom,
    StudentName,
    ClassLevel,
    Section,
    RollNo,
    MajorSubject,
    PaymentFor,
    Amount,
    AmountInWords,
    PaymentMode,
    PaymentDetails,
}

serde_plain::derive_display_from_serialize!(ReceiptField);
serde_plain::derive_fromstr_from_deserialize!(ReceiptField);

/// The per-student fields produced by the text-generation service.
///
/// Deserialization is strict: every field is required and unknown fields are rejected.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentDetails {
    pub student_name: String,
    pub class_level: String,
    pub section: String,
    pub roll_no: String,
    pub major_subject: String,
    pub amount: Amount,
    pub amount_in_words: String,
    pub payment_mode: String,
    pub payment_details: String,
}

impl StudentDetails {
    /// Checks the constraints the response schema promises but JSON parsing cannot express.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.student_name.trim().is_empty(),
            "Generated student details have an empty studentName"
        );
        ensure!(
            self.amount
                .is_within(MIN_GENERATED_AMOUNT, MAX_GENERATED_AMOUNT),
            "Generated amount {} for '{}' is outside {MIN_GENERATED_AMOUNT}..={MAX_GENERATED_AMOUNT}",
            self.amount,
            self.student_name
        );
        Ok(())
    }
}

/// The academic year label starting in `year`, e.g. `2026-27`.
pub fn academic_year(year: i32) -> String {
    format!("{year}-{:02}", (year + 1).rem_euclid(100))
}

fn new_id() -> String {
    format!("receipt-{}", Uuid::new_v4())
}
