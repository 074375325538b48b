//! EDGAR submissions feed (`data.sec.gov/submissions/CIK##########.json`).

use serde::Deserialize;

use crate::models::Accession;

/// Form types carrying a holdings information table.
pub const FORM_TYPES: [&str; 2] = ["13F-HR", "13F-HR/A"];

#[derive(Debug, Deserialize)]
struct Submissions {
    cik: String,
    filings: Filings,
}

#[derive(Debug, Deserialize)]
struct Filings {
    recent: RecentFilings,
}

/// Column-oriented listing; all vectors are index-aligned.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    accession_number: Vec<String>,
    filing_date: Vec<String>,
    #[serde(default)]
    report_date: Vec<String>,
    form: Vec<String>,
}

/// Parse a submissions feed into holdings-report accessions, newest first
/// as listed by the feed.
pub fn parse_submissions(json: &str) -> Result<Vec<Accession>, serde_json::Error> {
    let submissions: Submissions = serde_json::from_str(json)?;
    let recent = submissions.filings.recent;

    let accessions = recent
        .accession_number
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            recent
                .form
                .get(*i)
                .is_some_and(|form| FORM_TYPES.contains(&form.as_str()))
        })
        .map(|(i, id)| {
            let report_date = recent.report_date.get(i).map(String::as_str).unwrap_or("");
            let mut accession = Accession::new(id.as_str(), &submissions.cik, report_date);
            if let Some(filing_date) = recent.filing_date.get(i) {
                accession = accession.with_filing_date(filing_date);
            }
            accession
        })
        .collect();

    Ok(accessions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submissions_keeps_holdings_reports() {
        let json = r#"{
            "cik": "1067983",
            "name": "BERKSHIRE HATHAWAY INC",
            "filings": {
                "recent": {
                    "accessionNumber": ["0000950123-24-002518", "0001193125-24-000001", "0000950123-23-011111"],
                    "filingDate": ["2024-02-14", "2024-01-05", "2023-11-14"],
                    "reportDate": ["2023-12-31", "", "2023-09-30"],
                    "form": ["13F-HR", "8-K", "13F-HR/A"]
                },
                "files": []
            }
        }"#;
        let accessions = parse_submissions(json).unwrap();
        assert_eq!(accessions.len(), 2);
        assert_eq!(accessions[0].id.as_str(), "0000950123-24-002518");
        assert_eq!(accessions[0].cik, "0001067983");
        assert_eq!(accessions[0].report_date, "2023-12-31");
        assert_eq!(accessions[0].filing_date.as_deref(), Some("2024-02-14"));
        assert_eq!(accessions[1].id.as_str(), "0000950123-23-011111");
    }

    #[test]
    fn test_parse_submissions_rejects_garbage() {
        assert!(parse_submissions("{\"cik\": 1}").is_err());
    }
}
