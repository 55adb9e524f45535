use crate::error::ProviderError;
use crate::fetch::normalize_tickers;
use std::io::Read;

/// Extracts the ticker list from an uploaded CSV file.
///
/// The first row is a header. Each following record contributes its first column;
/// blank cells are skipped and duplicates keep their first position.
pub fn parse_ticker_csv<R: Read>(reader: R) -> Result<Vec<String>, ProviderError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut tickers = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(first) = record.get(0) {
            tickers.push(first.to_string());
        }
    }
    Ok(normalize_tickers(&tickers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_column_after_header() {
        let csv = "Ticker,Name\nAAPL,Apple\n RY.TO ,Royal Bank\n,blank\nAAPL,dup\nSHOP\n";
        let tickers = parse_ticker_csv(csv.as_bytes()).unwrap();
        assert_eq!(tickers, vec!["AAPL", "RY.TO", "SHOP"]);
    }

    #[test]
    fn header_only_file_is_empty() {
        assert!(parse_ticker_csv("Ticker\n".as_bytes()).unwrap().is_empty());
    }
}
