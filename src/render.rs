//! Renders a receipt into a self-contained SVG document.
//!
//! The output is a pure function of the record and the two optional images, so rendering the
//! same inputs twice yields byte-identical documents.

use crate::model::{ImageRef, ReceiptRecord};

/// Width of the receipt in SVG user units (and in pixels at a pixel ratio of 1).
pub const RECEIPT_WIDTH: u32 = 800;

/// Height of the receipt, giving an A-series aspect ratio of 1 : 1.414. Receipts whose text
/// does not fit grow taller so the signature block is never cut off.
pub const RECEIPT_HEIGHT: u32 = 1131;

/// Shown in place of the signature until one has been generated.
pub const SIGNATURE_PLACEHOLDER: &str = "Processing the Signature...";

const SIGNATORY: &str = "Principal / Accountant";
const FONT_FAMILY: &str = "DejaVu Sans, Arial, Helvetica, sans-serif";
const MARGIN: f32 = 32.0;
const CONTENT_WIDTH: f32 = RECEIPT_WIDTH as f32 - 2.0 * MARGIN;
const BODY_SIZE: f32 = 16.0;
const LINE_HEIGHT: f32 = 26.0;
const ROW_HEIGHT: f32 = 40.0;

/// A rendered receipt: SVG markup plus its intrinsic size.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RenderedDocument {
    svg: String,
    width: u32,
    height: u32,
}

impl RenderedDocument {
    pub fn svg(&self) -> &str {
        &self.svg
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Renders `record` with an optional school logo and an optional signature image.
pub fn render(
    record: &ReceiptRecord,
    logo: Option<&ImageRef>,
    signature: Option<&ImageRef>,
) -> RenderedDocument {
    let mut svg = Svg::new(RECEIPT_WIDTH);
    let right = RECEIPT_WIDTH as f32 - MARGIN;
    let center = RECEIPT_WIDTH as f32 / 2.0;

    let watermark_y = RECEIPT_HEIGHT as f32 / 2.0;
    svg.push(format!(
        r##"<text x="{center}" y="{watermark_y}" font-family="{FONT_FAMILY}" font-size="208" font-weight="900" fill="#ef4444" fill-opacity="0.15" text-anchor="middle" dominant-baseline="middle" transform="rotate(-15 {center} {watermark_y})">PAID</text>"##
    ));

    // Header
    let mut y = MARGIN + 8.0;
    if let Some(logo) = logo {
        svg.push(format!(
            r#"<image x="{}" y="{y}" width="192" height="96" preserveAspectRatio="xMidYMid meet" href="{}"/>"#,
            center - 96.0,
            logo.to_data_uri()
        ));
        y += 112.0;
    }
    for line in wrap(&record.school_address, 80) {
        y += 20.0;
        svg.text(center, y, 14.0, Anchor::Middle, &[Span::plain(&line)]);
    }
    y += 20.0;
    svg.text(
        center,
        y,
        14.0,
        Anchor::Middle,
        &[Span::bold("Phone: "), Span::plain(&record.school_phone)],
    );
    y += 20.0;
    svg.push(format!(
        r#"<rect x="{}" y="{y}" width="300" height="40" fill="black"/>"#,
        center - 150.0
    ));
    svg.push(format!(
        r#"<text x="{center}" y="{}" font-family="{FONT_FAMILY}" font-size="24" font-weight="600" fill="white" text-anchor="middle">TUITION FEE RECEIPT</text>"#,
        y + 29.0
    ));
    y += 56.0;
    svg.hline(MARGIN, right, y, 2.0);

    // Receipt details
    y += 36.0;
    svg.text(
        MARGIN,
        y,
        BODY_SIZE,
        Anchor::Start,
        &[Span::bold("Receipt No: "), Span::plain(&record.receipt_no)],
    );
    let date = record.issue_date.format("%d/%m/%Y").to_string();
    svg.text(
        right,
        y,
        BODY_SIZE,
        Anchor::End,
        &[Span::bold("Date: "), Span::plain(&date)],
    );
    y += LINE_HEIGHT + 8.0;
    svg.text(
        MARGIN,
        y,
        BODY_SIZE,
        Anchor::Start,
        &[Span::bold("Academic Year: "), Span::plain(&record.academic_year)],
    );
    y += LINE_HEIGHT + 8.0;
    y = svg.labeled(
        MARGIN,
        y,
        "Received with thanks from: ",
        &record.received_from,
        80,
    );

    // Student table
    y += 8.0;
    let class_section = format!("{} - {}", record.class_level, record.section);
    let rows = [
        ("Student Name", record.student_name.as_str()),
        ("Class & Section", class_section.as_str()),
        ("Roll No.", record.roll_no.as_str()),
        ("Major Subject/Skill", record.major_subject.as_str()),
    ];
    let label_width = (CONTENT_WIDTH / 3.0).round();
    for (label, value) in rows {
        svg.push(format!(
            r#"<rect x="{MARGIN}" y="{y}" width="{CONTENT_WIDTH}" height="{ROW_HEIGHT}" fill="none" stroke="black" stroke-width="1"/>"#
        ));
        let baseline = y + 26.0;
        svg.text(
            MARGIN + 8.0,
            baseline,
            BODY_SIZE,
            Anchor::Start,
            &[Span::bold(label)],
        );
        svg.text(
            MARGIN + label_width + 8.0,
            baseline,
            BODY_SIZE,
            Anchor::Start,
            &[Span::plain(value)],
        );
        y += ROW_HEIGHT;
    }

    // Payment
    y += 32.0;
    y = svg.labeled(MARGIN, y, "Payment for: ", &record.payment_for, 80);
    y += 4.0;
    svg.hline(MARGIN, right, y, 2.0);
    let total_baseline = y + 38.0;
    let amount = format!("₹{}", record.amount);
    svg.text(
        right,
        total_baseline,
        24.0,
        Anchor::End,
        &[Span::bold(&amount)],
    );
    let amount_width = 16.0 * amount.chars().count() as f32;
    svg.text(
        right - amount_width - 24.0,
        total_baseline,
        20.0,
        Anchor::End,
        &[Span::bold("TOTAL")],
    );
    y += 56.0;
    svg.hline(MARGIN, right, y, 2.0);
    y += 32.0;
    y = svg.labeled(
        MARGIN,
        y,
        "Amount in Words: ",
        &record.amount_in_words,
        76,
    );

    y += 8.0;
    let column = center + 8.0;
    let mode_end = svg.labeled(MARGIN, y, "Payment Mode: ", &record.payment_mode, 38);
    let details_end = svg.labeled(
        column,
        y,
        "Payment Details: ",
        &record.payment_details,
        38,
    );
    y = mode_end.max(details_end);

    // Signature
    let sig_width = (CONTENT_WIDTH / 3.0).round();
    let sig_left = right - sig_width;
    let sig_center = sig_left + sig_width / 2.0;
    let sig_top = (y + 48.0).max(RECEIPT_HEIGHT as f32 - 200.0);
    match signature {
        Some(signature) => svg.push(format!(
            r#"<image x="{sig_left}" y="{sig_top}" width="{sig_width}" height="80" preserveAspectRatio="xMidYMid meet" href="{}"/>"#,
            signature.to_data_uri()
        )),
        None => svg.push(format!(
            r##"<text x="{sig_center}" y="{}" font-family="{FONT_FAMILY}" font-size="{BODY_SIZE}" fill="#9ca3af" text-anchor="middle">{}</text>"##,
            sig_top + 46.0,
            escape(SIGNATURE_PLACEHOLDER)
        )),
    }
    let sig_line = sig_top + 84.0;
    svg.hline(sig_left, right, sig_line, 2.0);
    let signatory_baseline = sig_line + 26.0;
    svg.text(
        sig_center,
        signatory_baseline,
        BODY_SIZE,
        Anchor::Middle,
        &[Span::bold(SIGNATORY)],
    );

    let content_bottom = (signatory_baseline + MARGIN).ceil() as u32;
    svg.finish(RECEIPT_HEIGHT.max(content_bottom))
}

#[derive(Debug, Clone, Copy)]
enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn as_str(self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

struct Span<'a> {
    text: &'a str,
    bold: bool,
}

impl<'a> Span<'a> {
    fn plain(text: &'a str) -> Self {
        Self { text, bold: false }
    }

    fn bold(text: &'a str) -> Self {
        Self { text, bold: true }
    }
}

struct Svg {
    body: String,
    width: u32,
}

impl Svg {
    fn new(width: u32) -> Self {
        Self {
            body: String::new(),
            width,
        }
    }

    fn push(&mut self, element: String) {
        self.body.push_str(&element);
        self.body.push('\n');
    }

    fn text(&mut self, x: f32, y: f32, size: f32, anchor: Anchor, spans: &[Span<'_>]) {
        let content: String = spans
            .iter()
            .map(|span| {
                let weight = if span.bold { "bold" } else { "normal" };
                format!(
                    r#"<tspan font-weight="{weight}">{}</tspan>"#,
                    escape(span.text)
                )
            })
            .collect();
        self.push(format!(
            r#"<text x="{x}" y="{y}" font-family="{FONT_FAMILY}" font-size="{size}" fill="black" text-anchor="{}" xml:space="preserve">{content}</text>"#,
            anchor.as_str()
        ));
    }

    /// Writes a bold label followed by `value`, wrapped to `max_chars`. Returns the next `y`.
    fn labeled(&mut self, x: f32, y: f32, label: &str, value: &str, max_chars: usize) -> f32 {
        let label_chars = label.chars().count();
        let lines = wrap(value, max_chars.saturating_sub(label_chars).max(1));
        let mut y = y;
        for (i, line) in lines.iter().enumerate() {
            if i == 0 {
                self.text(
                    x,
                    y,
                    BODY_SIZE,
                    Anchor::Start,
                    &[Span::bold(label), Span::plain(line)],
                );
            } else {
                self.text(x, y, BODY_SIZE, Anchor::Start, &[Span::plain(line)]);
            }
            y += LINE_HEIGHT;
        }
        y
    }

    fn hline(&mut self, x1: f32, x2: f32, y: f32, width: f32) {
        self.push(format!(
            r#"<line x1="{x1}" y1="{y}" x2="{x2}" y2="{y}" stroke="black" stroke-width="{width}"/>"#
        ));
    }

    /// Wraps the body in the page background and border, sized `width` x `height`.
    fn finish(self, height: u32) -> RenderedDocument {
        let w = self.width;
        let svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{height}\" viewBox=\"0 0 {w} {height}\">\n\
            <rect x=\"0\" y=\"0\" width=\"{w}\" height=\"{height}\" fill=\"white\"/>\n\
            <rect x=\"2\" y=\"2\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"black\" stroke-width=\"4\"/>\n\
            {body}</svg>\n",
            w - 4,
            height - 4,
            body = self.body
        );
        RenderedDocument {
            svg,
            width: w,
            height,
        }
    }
}

/// Escapes text for use in SVG character data and attribute values.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Greedy word wrap by character count. Words longer than `max_chars` get a line of their own.
/// Always returns at least one line.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchoolInfo;
    use chrono::NaiveDate;

    fn record() -> ReceiptRecord {
        let school = SchoolInfo::new("1 School Road", "+91 00000 00000");
        ReceiptRecord::initial(&school, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
    }

    #[test]
    fn test_render_is_deterministic() {
        let record = record();
        let logo = ImageRef::new("image/png", vec![1, 2, 3]);
        let a = render(&record, Some(&logo), None);
        let b = render(&record, Some(&logo), None);
        assert_eq!(a, b);
        assert_eq!(a.width(), RECEIPT_WIDTH);
        assert_eq!(a.height(), RECEIPT_HEIGHT);
    }

    #[test]
    fn test_render_contents() {
        let record = record();
        let doc = render(&record, None, None);
        let svg = doc.svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("TUITION FEE RECEIPT"));
        assert!(svg.contains("PAID"));
        assert!(svg.contains("18/10/2026"));
        assert!(svg.contains("₹50,000"));
        assert!(svg.contains(&record.receipt_no));
        assert!(svg.contains("Aarav Sharma"));
        assert!(svg.contains("Class X - A"));
        assert!(svg.contains("Fifty Thousand Rupees Only"));
        assert!(svg.contains(SIGNATORY));
        assert!(!svg.contains("<image"));
    }

    #[test]
    fn test_placeholder_without_signature() {
        let doc = render(&record(), None, None);
        assert!(doc.svg().contains(SIGNATURE_PLACEHOLDER));
    }

    #[test]
    fn test_signature_replaces_placeholder() {
        let signature = ImageRef::new("image/png", vec![1, 2, 3]);
        let doc = render(&record(), None, Some(&signature));
        assert!(!doc.svg().contains(SIGNATURE_PLACEHOLDER));
        assert!(doc.svg().contains("data:image/png;base64,AQID"));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut record = record();
        record.student_name = "<Tom & \"Jerry\">".to_string();
        let doc = render(&record, None, None);
        assert!(doc.svg().contains("&lt;Tom &amp; &quot;Jerry&quot;&gt;"));
        assert!(!doc.svg().contains("<Tom"));
    }

    /// The y coordinate of the signature line, the last `<line>` in the document.
    fn signature_line_y(svg: &str) -> f32 {
        let line = svg
            .lines()
            .filter(|l| l.starts_with("<line"))
            .last()
            .unwrap();
        let y = line.split("y1=\"").nth(1).unwrap();
        y[..y.find('"').unwrap()].parse().unwrap()
    }

    #[test]
    fn test_long_text_grows_the_page() {
        let mut record = record();
        let long = "word ".repeat(400);
        record.school_address = long.clone();
        record.amount_in_words = long.clone();
        record.payment_details = long;

        let doc = render(&record, None, None);

        assert!(doc.height() > RECEIPT_HEIGHT);
        let sig_line = signature_line_y(doc.svg());
        assert!(sig_line + 26.0 < doc.height() as f32);
        assert!(doc
            .svg()
            .contains(&format!("viewBox=\"0 0 {RECEIPT_WIDTH} {}\"", doc.height())));
        assert!(doc
            .svg()
            .contains(&format!("height=\"{}\" fill=\"none\"", doc.height() - 4)));
    }

    #[test]
    fn test_short_text_keeps_the_page_size() {
        let doc = render(&record(), None, None);
        assert_eq!(doc.height(), RECEIPT_HEIGHT);
        assert!(signature_line_y(doc.svg()) < RECEIPT_HEIGHT as f32);
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("", 10), vec![""]);
        assert_eq!(wrap("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap("abcdefghijkl xy", 5), vec!["abcdefghijkl", "xy"]);
        assert_eq!(wrap("  a   b  ", 10), vec!["a b"]);
    }
}
