//! Question table loading (CSV with headers).
//!
//! Required columns: `question`, `suggested_answer`, `guided_response`.
//! Column order is free and extra columns are ignored.

use csv::{ReaderBuilder, StringRecord};
use tracing::{info, instrument, warn};

use crate::domain::QuestionRecord;
use crate::error::AppError;

pub const REQUIRED_COLUMNS: [&str; 3] = ["question", "suggested_answer", "guided_response"];

/// Parse CSV text into question records, validating columns and row shape.
#[instrument(level = "info", skip(csv_text), fields(bytes = csv_text.len()))]
pub fn load_questions(csv_text: &str) -> Result<Vec<QuestionRecord>, AppError> {
  let mut reader = ReaderBuilder::new()
    .flexible(true)
    .has_headers(true)
    .trim(csv::Trim::Headers)
    .from_reader(csv_text.as_bytes());

  let headers = reader
    .headers()
    .map_err(|e| AppError::validation(format!("Failed to read CSV header: {}", e)))?
    .clone();

  let columns = column_positions(&headers)?;

  let mut records = Vec::new();
  for (row, result) in reader.records().enumerate() {
    let row_no = row + 1;
    let record = result.map_err(|e| AppError::validation(format!("Failed to read CSV row {}: {}", row_no, e)))?;
    if record.len() < headers.len() {
      warn!(target: "quiz", row = row_no, fields = record.len(), expected = headers.len(), "Short CSV row");
      return Err(AppError::validation(format!(
        "Row {} has {} fields, expected {}",
        row_no,
        record.len(),
        headers.len()
      )));
    }
    let field = |idx: usize| record.get(idx).unwrap_or_default().to_string();
    records.push(QuestionRecord {
      question: field(columns[0]),
      suggested_answer: field(columns[1]),
      guided_response: field(columns[2]),
    });
  }

  info!(target: "quiz", rows = records.len(), "Question table loaded");
  Ok(records)
}

/// Positions of the required columns, or a validation error naming every missing one.
fn column_positions(headers: &StringRecord) -> Result<[usize; 3], AppError> {
  let mut positions = [0usize; 3];
  let mut missing = Vec::new();
  for (slot, name) in REQUIRED_COLUMNS.iter().enumerate() {
    match headers.iter().position(|h| h == *name) {
      Some(idx) => positions[slot] = idx,
      None => missing.push(*name),
    }
  }
  if missing.is_empty() {
    Ok(positions)
  } else {
    Err(AppError::validation(format!(
      "The CSV file must contain the columns: {}. Missing: {}",
      REQUIRED_COLUMNS.join(", "),
      missing.join(", ")
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn loads_well_formed_table() {
    let csv = "question,suggested_answer,guided_response\n\
               What do plants need?,sunlight,Think about the sky\n\
               \"Name a mammal, please\",cat,It purrs\n";
    let rows = load_questions(csv).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].question, "Name a mammal, please");
    assert_eq!(rows[1].suggested_answer, "cat");
    assert_eq!(rows[0].guided_response, "Think about the sky");
  }

  #[test]
  fn column_order_is_free_and_extras_ignored() {
    let csv = "id,guided_response , question,suggested_answer\n7,G,Q,A\n";
    let rows = load_questions(csv).unwrap();
    assert_eq!(
      rows,
      vec![QuestionRecord { question: "Q".into(), suggested_answer: "A".into(), guided_response: "G".into() }]
    );
  }

  #[test]
  fn reports_every_missing_column() {
    let err = load_questions("question,answer\nQ,A\n").unwrap_err();
    let msg = err.to_string();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(msg.contains("suggested_answer"));
    assert!(msg.contains("guided_response"));
  }

  #[test]
  fn rejects_short_rows() {
    let csv = "question,suggested_answer,guided_response\nQ1,A1,G1\nQ2,A2\n";
    let err = load_questions(csv).unwrap_err();
    assert!(err.to_string().contains("Row 2"));
  }

  #[test]
  fn header_only_yields_no_rows() {
    let rows = load_questions("question,suggested_answer,guided_response\n").unwrap();
    assert!(rows.is_empty());
  }
}
