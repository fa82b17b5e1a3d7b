use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Performance year (`실적년도`).
pub const FIELD_YEAR: &str = "PFMC_YMD";
/// Production / import-export quantity.
pub const FIELD_PROD_QTY: &str = "PROD_QTY";
/// Permitted quantity.
pub const FIELD_PRMSN_QTY: &str = "PRMSN_QTY";
/// Item name, used as a substring filter by the service.
pub const FIELD_ITEM_NAME: &str = "ITEM_NAME";

/// The only result code the provider uses for success.
pub const RESULT_CODE_OK: &str = "00";

/// One item from the response body, kept as the provider sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Numeric view of a field, keeping "missing" and "not a number" apart.
    pub fn numeric(&self, key: &str) -> Numeric {
        Numeric::from_value(self.get(key))
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(m: Map<String, Value>) -> Self {
        Self(m)
    }
}

/// Result of coercing a loosely typed field to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    /// Key missing or JSON `null`.
    Absent,
    /// Present, but neither a finite number nor a numeric string.
    Invalid,
    Value(f64),
}

impl Numeric {
    pub fn from_value(v: Option<&Value>) -> Self {
        match v {
            None | Some(Value::Null) => Numeric::Absent,
            Some(Value::Number(n)) => n.as_f64().map_or(Numeric::Invalid, Numeric::finite),
            Some(Value::Bool(b)) => Numeric::Value(if *b { 1.0 } else { 0.0 }),
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(x) => Numeric::finite(x),
                Err(_) => Numeric::Invalid,
            },
            Some(_) => Numeric::Invalid,
        }
    }

    fn finite(x: f64) -> Self {
        if x.is_finite() {
            Numeric::Value(x)
        } else {
            Numeric::Invalid
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Numeric::Value(x) => Some(x),
            _ => None,
        }
    }
}

/// One row of the per-year summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i64,
    pub prod_qty_sum: f64,
    pub prmsn_qty_sum: f64,
}

impl From<&YearSummary> for RawRecord {
    /// Maps a summary row back onto the raw field names so it can be aggregated again.
    fn from(s: &YearSummary) -> Self {
        let mut m = Map::new();
        m.insert(FIELD_YEAR.into(), Value::from(s.year));
        m.insert(FIELD_PROD_QTY.into(), Value::from(s.prod_qty_sum));
        m.insert(FIELD_PRMSN_QTY.into(), Value::from(s.prmsn_qty_sum));
        RawRecord(m)
    }
}

/// `header` section of the response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub result_code: Option<String>,
    pub result_msg: Option<String>,
}

impl Header {
    fn from_value(v: Option<&Value>) -> Self {
        let Some(obj) = v.and_then(Value::as_object) else {
            return Header::default();
        };
        Header {
            result_code: obj.get("resultCode").and_then(scalar_to_string),
            result_msg: obj.get("resultMsg").and_then(scalar_to_string),
        }
    }

    /// `true` unless a result code is present and differs from `"00"`.
    pub fn is_success(&self) -> bool {
        self.result_code
            .as_deref()
            .is_none_or(|c| c == RESULT_CODE_OK)
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Errors while locating header/body inside a decoded response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("`response` is present but not an object")]
    BadResponse,
    #[error("`body` is present but not an object")]
    BadBody,
}

/// Borrowed view of `{ response?: { header?, body? } }`.
///
/// Every wrapping level is optional: the top level may itself be the
/// envelope, and a missing `body` means the items sit next to the header.
#[derive(Debug, Clone)]
pub struct Envelope<'a> {
    pub header: Header,
    pub body: &'a Map<String, Value>,
}

impl<'a> Envelope<'a> {
    pub fn unwrap(v: &'a Value) -> Result<Self, EnvelopeError> {
        let top = v.as_object().ok_or(EnvelopeError::NotAnObject)?;
        let response = match top.get("response") {
            Some(r) => r.as_object().ok_or(EnvelopeError::BadResponse)?,
            None => top,
        };
        let header = Header::from_value(response.get("header"));
        let body = match response.get("body") {
            Some(b) => b.as_object().ok_or(EnvelopeError::BadBody)?,
            None => response,
        };
        Ok(Envelope { header, body })
    }

    /// Normalized `items`: a list stays a list, a lone object becomes one record.
    ///
    /// `None` when `items` is missing or falsy (`null`, `[]`, `{}`, `""`, `0`, `false`).
    /// The second value counts entries that were not objects and got skipped.
    pub fn items(&self) -> Option<(Vec<RawRecord>, usize)> {
        let v = self.body.get("items").filter(|v| !is_falsy(v))?;
        let found = match v {
            Value::Array(list) => {
                let mut skipped = 0;
                let out = list
                    .iter()
                    .filter_map(|it| match it {
                        Value::Object(m) => Some(RawRecord(m.clone())),
                        _ => {
                            skipped += 1;
                            None
                        }
                    })
                    .collect();
                (out, skipped)
            }
            Value::Object(m) => (vec![RawRecord(m.clone())], 0),
            _ => (Vec::new(), 1),
        };
        Some(found)
    }

    /// Reported `totalCount`; `fallback` when missing or not numeric, 0 when falsy.
    pub fn total_count(&self, fallback: u64) -> u64 {
        count_field(self.body.get("totalCount"), fallback, Some(0))
    }

    /// Reported `numOfRows`; `fallback` when missing, falsy or not numeric.
    pub fn num_of_rows(&self, fallback: u64) -> u64 {
        count_field(self.body.get("numOfRows"), fallback, None)
    }
}

fn count_field(v: Option<&Value>, fallback: u64, when_falsy: Option<u64>) -> u64 {
    let Some(v) = v else { return fallback };
    if is_falsy(v) {
        return when_falsy.unwrap_or(fallback);
    }
    match Numeric::from_value(Some(v)) {
        Numeric::Value(x) if x >= 0.0 => x.trunc() as u64,
        _ => fallback,
    }
}

/// Loose truthiness used for `items`, `totalCount` and `numOfRows`.
pub fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
