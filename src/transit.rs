use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::{
    fare::FareError,
    ledger::{TransactionKind, TransactionRecord},
};

/// Label of metro route memos.
pub const METRO_LABEL: &str = "Metro";
/// Entry must happen within this many minutes of booking.
pub const TICKET_VALIDITY_MINUTES: i64 = 45;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitLine {
    key: String,
    name: String,
    stops: Vec<String>,
}

impl TransitLine {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        stops: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            stops: stops.into_iter().map(Into::into).collect(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stops(&self) -> &[String] {
        &self.stops
    }

    pub fn position(&self, stop: &str) -> Option<usize> {
        self.stops.iter().position(|s| s == stop)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitNetwork {
    operator: String,
    lines: Vec<TransitLine>,
}

impl TransitNetwork {
    pub fn new(operator: impl Into<String>, lines: Vec<TransitLine>) -> Self {
        Self {
            operator: operator.into(),
            lines,
        }
    }

    pub fn kolkata_metro() -> Self {
        Self::new(
            "Aamar Kolkata Metro",
            vec![
                TransitLine::new(
                    "blue",
                    "Blue Line (North-South)",
                    [
                        "Dakshineswar",
                        "Baranagar",
                        "Noapara",
                        "Belgachia",
                        "Shyambazar",
                        "Shobhabazar Sutanuti",
                        "Girish Park",
                        "Mahatma Gandhi Road",
                        "Central",
                        "Chandni Chowk",
                        "Esplanade",
                        "Park Street",
                        "Maidan",
                        "Rabindra Sadan",
                        "Netaji Bhawan",
                        "Jatin Das Park",
                        "Gitanjali",
                        "Kavi Nazrul",
                        "Ghatak Pukur",
                        "Sonarpur",
                        "Kamalgachi",
                        "Kavi Subhash (New Garia)",
                    ],
                ),
                TransitLine::new(
                    "green",
                    "Green Line (East-West)",
                    [
                        "Sector V",
                        "Salt Lake Stadium",
                        "Central Park",
                        "City Centre",
                        "Bidhannagar Road",
                        "Phoolbagan",
                        "Sealdah",
                        "B.B.D. Bag",
                        "Esplanade",
                        "Mahakaran",
                        "Howrah",
                        "Howrah Maidan",
                    ],
                ),
                TransitLine::new(
                    "purple",
                    "Purple Line",
                    [
                        "Joka",
                        "Thakurpukur",
                        "Majerhat",
                        "Kidderpore",
                        "Park Circus",
                        "Esplanade",
                    ],
                ),
                TransitLine::new(
                    "orange",
                    "Orange Line",
                    [
                        "New Garia",
                        "Hemanta Mukhopadhyay",
                        "Bansdroni",
                        "Naktala",
                        "Metropolitan",
                        "Kudghat",
                    ],
                ),
            ],
        )
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn lines(&self) -> &[TransitLine] {
        &self.lines
    }

    pub fn line(&self, key: &str) -> Result<&TransitLine, FareError> {
        self.lines
            .iter()
            .find(|line| line.key == key)
            .ok_or_else(|| FareError::UnknownLine(key.to_string()))
    }
}

/// Route encoded in a memo as `<Label>: <From> to <To> (<Line>)`.
///
/// Stop and line names may themselves contain parentheses, e.g.
/// `Metro: Esplanade to Kavi Subhash (New Garia) (Blue Line (North-South))`; the line is the
/// last balanced group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMemo {
    pub label: String,
    pub from: String,
    pub to: String,
    pub line: String,
}

impl RouteMemo {
    pub fn metro(from: impl Into<String>, to: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            label: METRO_LABEL.to_string(),
            from: from.into(),
            to: to.into(),
            line: line.into(),
        }
    }

    /// `None` when the memo does not follow the route pattern.
    pub fn parse(memo: &str) -> Option<Self> {
        let (label, rest) = memo.split_once(": ")?;
        let body = rest.strip_suffix(')')?;

        let mut depth = 0usize;
        let mut open = None;
        for (idx, ch) in body.char_indices().rev() {
            match ch {
                ')' => depth += 1,
                '(' if depth == 0 => {
                    open = Some(idx);
                    break;
                }
                '(' => depth -= 1,
                _ => {}
            }
        }
        let open = open?;
        let route = body[..open].strip_suffix(' ')?;
        let line = &body[open + 1..];
        let (from, to) = route.split_once(" to ")?;

        if [label, from, to, line].iter().any(|part| part.trim().is_empty()) {
            return None;
        }
        Some(Self {
            label: label.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            line: line.to_string(),
        })
    }
}

impl fmt::Display for RouteMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} to {} ({})",
            self.label, self.from, self.to, self.line
        )
    }
}

/// Ticket view of a route-encoded bill payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub route: RouteMemo,
    pub fare: Decimal,
    pub booked_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl Ticket {
    pub fn from_record(record: &TransactionRecord) -> Option<Self> {
        if record.kind != TransactionKind::BillPayment {
            return None;
        }
        let route = RouteMemo::parse(record.memo.as_deref()?)?;
        if route.label != METRO_LABEL {
            return None;
        }
        Some(Self {
            route,
            fare: record.amount,
            booked_at: record.created_at,
            valid_until: record.created_at + Duration::minutes(TICKET_VALIDITY_MINUTES),
        })
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.booked_at && at <= self.valid_until
    }
}
