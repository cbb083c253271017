//! Load a loan tape (package) from CSV
//!
//! Mirrors the CSV ingestion pattern used for the policy inforce file: a
//! private row struct matching the file's column names, converted into the
//! public [`Loan`] type with validation deferred to [`Loan::validate`].

use csv::Reader;
use serde::Deserialize;
use std::io::Read as IoRead;
use std::path::Path;

use super::data::Loan;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "LoanID")]
    loan_id: String,
    #[serde(rename = "UPB")]
    upb: f64,
    #[serde(rename = "NoteRate")]
    note_rate: f64,
    #[serde(rename = "OriginalTerm")]
    original_term: u32,
    #[serde(rename = "RemainingTerm")]
    remaining_term: u32,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "CreditScore")]
    credit_score: u16,
    #[serde(rename = "LTV")]
    ltv: f64,
    #[serde(rename = "OriginationYear")]
    origination_year: Option<u32>,
    #[serde(rename = "DTI")]
    dti: Option<f64>,
    #[serde(rename = "State")]
    state: Option<String>,
    #[serde(rename = "ITIN")]
    itin: Option<bool>,
}

impl From<CsvRow> for Loan {
    fn from(row: CsvRow) -> Self {
        Loan {
            loan_id: row.loan_id,
            upb: row.upb,
            note_rate: row.note_rate,
            original_term: row.original_term,
            remaining_term: row.remaining_term,
            age: row.age,
            credit_score: row.credit_score,
            ltv: row.ltv,
            origination_year: row.origination_year,
            dti: row.dti,
            state: row.state,
            itin: row.itin,
        }
    }
}

/// Load a loan tape from a CSV file on disk.
pub fn load_loans<P: AsRef<Path>>(path: P) -> Result<Vec<Loan>, Box<dyn std::error::Error>> {
    let mut reader = Reader::from_path(path)?;
    let mut loans = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        loans.push(Loan::from(row));
    }
    Ok(loans)
}

/// Load a loan tape from any reader (string buffer, network stream, ...).
pub fn load_loans_from_reader<R: IoRead>(
    reader: R,
) -> Result<Vec<Loan>, Box<dyn std::error::Error>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut loans = Vec::new();
    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        loans.push(Loan::from(row));
    }
    Ok(loans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_loans_from_reader() {
        let csv = "LoanID,UPB,NoteRate,OriginalTerm,RemainingTerm,Age,CreditScore,LTV,OriginationYear,DTI,State,ITIN\n\
                    L1,100000,0.06,360,120,240,720,0.75,2005,,CA,\n";
        let loans = load_loans_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].loan_id, "L1");
        assert_eq!(loans[0].remaining_term, 120);
        assert!(loans[0].dti.is_none());
    }
}
