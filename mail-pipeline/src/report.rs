use device_manager::VerificationReport;
use thiserror::Error;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Rendered verification report attached to a decrypted mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub bytes: Vec<u8>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("Report rendering failed: {0}")]
    Render(String),
}

/// Turns the token device's verification report into a PDF document.
#[cfg_attr(test, mockall::automock)]
pub trait SignReportRenderer: Send + Sync {
    /// # Errors
    ///
    /// [`ReportError::Render`] when no document can be produced.
    fn render(&self, report: &VerificationReport) -> Result<ReportArtifact, ReportError>;
}

// ============================================================================
// PLAIN PDF RENDERER
// ============================================================================

const PAGE_WIDTH: usize = 595;
const PAGE_HEIGHT: usize = 842;
const MARGIN: usize = 50;
const LEADING: usize = 14;
const MAX_LINES: usize = (PAGE_HEIGHT - 2 * MARGIN) / LEADING;

const TITLE: &str = "Signaturprüfbericht";

/// Single page A4 report in Helvetica, one line per report item.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfReportRenderer;

impl PdfReportRenderer {
    fn lines(report: &VerificationReport) -> Vec<String> {
        let mut lines = vec![TITLE.to_string(), String::new()];
        lines.push(format!("Ergebnis: {}", report.high_level_result));
        if let Some(signer) = &report.signer {
            lines.push(format!("Signaturersteller: {signer}"));
        }
        if let Some(signing_time) = report.signing_time {
            lines.push(format!("Signaturzeitpunkt: {}", signing_time.format("%d.%m.%Y %H:%M:%S UTC")));
        }
        if !report.details.is_empty() {
            lines.push(String::new());
            lines.push("Details:".to_string());
            lines.extend(report.details.iter().map(|detail| format!("- {detail}")));
        }
        lines.truncate(MAX_LINES);
        lines
    }
}

/// PDF string literal in WinAnsi encoding; characters outside Latin-1 become `?`.
fn pdf_string(text: &str, out: &mut Vec<u8>) {
    out.push(b'(');
    for c in text.chars() {
        match c {
            '(' => out.extend_from_slice(b"\\("),
            ')' => out.extend_from_slice(b"\\)"),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\r' | '\n' => out.push(b' '),
            _ => out.push(u8::try_from(u32::from(c)).unwrap_or(b'?')),
        }
    }
    out.push(b')');
}

fn content_stream(lines: &[String]) -> Vec<u8> {
    let mut stream = format!(
        "BT\n/F1 11 Tf\n{LEADING} TL\n{MARGIN} {} Td\n",
        PAGE_HEIGHT - MARGIN
    )
    .into_bytes();
    for line in lines {
        pdf_string(line, &mut stream);
        stream.extend_from_slice(b" Tj T*\n");
    }
    stream.extend_from_slice(b"ET");
    stream
}

fn write_document(stream: &[u8]) -> Vec<u8> {
    let objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
        )
        .into_bytes(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec(),
        {
            let mut object = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            object.extend_from_slice(stream);
            object.extend_from_slice(b"\nendstream");
            object
        },
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(object);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

impl SignReportRenderer for PdfReportRenderer {
    fn render(&self, report: &VerificationReport) -> Result<ReportArtifact, ReportError> {
        if report.high_level_result.trim().is_empty() {
            return Err(ReportError::Render("verification report without result".to_string()));
        }
        let stream = content_stream(&Self::lines(report));
        Ok(ReportArtifact {
            bytes: write_document(&stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn report() -> VerificationReport {
        VerificationReport {
            high_level_result: "VALID".to_string(),
            signer: Some("Praxis Dr. Müller (Test)".to_string()),
            signing_time: Some(Utc.with_ymd_and_hms(2024, 5, 17, 9, 15, 0).unwrap()),
            details: vec!["Zertifikat gültig".to_string()],
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    #[test]
    fn test_pdf_structure() {
        let artifact = PdfReportRenderer::default().render(&report()).unwrap();
        let bytes = artifact.bytes;
        assert!(bytes.starts_with(b"%PDF-1.4\n"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        assert!(contains(&bytes, b"(Ergebnis: VALID) Tj"));
        assert!(contains(&bytes, b"(Signaturzeitpunkt: 17.05.2024 09:15:00 UTC) Tj"));
        // parentheses escaped, umlaut in WinAnsi
        assert!(contains(&bytes, b"Dr. M\xFCller \\(Test\\)"));
        assert!(contains(&bytes, b"(Signaturpr\xFCfbericht) Tj"));
    }

    #[test]
    fn test_pdf_string_escapes() {
        let mut out = Vec::new();
        pdf_string("a(b)c\\d\né€", &mut out);
        assert_eq!(out, b"(a\\(b\\)c\\\\d \xE9?)");
    }

    #[test]
    fn test_long_reports_fit_one_page() {
        let mut report = report();
        report.details = (0..100).map(|i| format!("Detail {i}")).collect();
        let lines = PdfReportRenderer::lines(&report);
        assert_eq!(lines.len(), MAX_LINES);
        assert_eq!(lines.first().map(String::as_str), Some(TITLE));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let bytes = PdfReportRenderer::default().render(&report()).unwrap().bytes;
        let text = String::from_utf8_lossy(&bytes);
        let xref = text.find("xref\n").unwrap();
        let entries: Vec<usize> = text[xref..]
            .lines()
            .skip(3)
            .take(5)
            .map(|line| line[..10].parse().unwrap())
            .collect();
        for (index, offset) in entries.iter().enumerate() {
            let expected = format!("{} 0 obj", index + 1);
            assert!(bytes[*offset..].starts_with(expected.as_bytes()));
        }
    }

    #[test]
    fn test_empty_result_is_rejected() {
        let mut report = report();
        report.high_level_result = String::new();
        assert!(PdfReportRenderer::default().render(&report).is_err());
    }
}
