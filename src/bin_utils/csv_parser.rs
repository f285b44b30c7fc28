use std::io::Read;

use crate::command::RawCommand;
use csv::{DeserializeRecordsIntoIter, Trim};

/// Parses a wallet operation list in CSV format.
///
/// Yields each row together with its line number, so a malformed row can be reported
/// without stopping the caller.
pub struct CsvOperationParser<R> {
    iter: DeserializeRecordsIntoIter<R, RawCommand>,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, Result<RawCommand, csv::Error>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::command::OperationKind;

    use super::*;

    const ROWS: &str = "\
op,account,amount,counterparty,reference,pin,memo,line,from,to
top_up, 1, 500.00,,,,,,,
ticket,1,,,,1234,,green,Sector V,Howrah Maidan
refund,1,5,,,,,,,
";

    #[test]
    fn parse_rows_with_line_numbers() {
        let rows: Vec<_> = CsvOperationParser::new(ROWS.as_bytes()).collect();
        assert_eq!(rows.len(), 3);

        let (line, top_up) = &rows[0];
        let top_up = top_up.as_ref().unwrap();
        assert_eq!(*line, 2);
        assert_eq!(top_up.kind, OperationKind::TopUp);
        assert_eq!(top_up.amount, Some(Decimal::new(50000, 2)));
        assert_eq!(top_up.reference, None);

        let (line, ticket) = &rows[1];
        let ticket = ticket.as_ref().unwrap();
        assert_eq!(*line, 3);
        assert_eq!(ticket.from.as_deref(), Some("Sector V"));
        assert_eq!(ticket.to.as_deref(), Some("Howrah Maidan"));

        let (line, unknown) = &rows[2];
        assert_eq!(*line, 4);
        assert!(unknown.is_err());
    }
}
