use core::fmt;

use log::info;
use serde::Deserialize;

use crate::http_client;
use crate::trend_icons::TrendArrow;

const LOGIN_PATH: &str = "/llu/auth/login";
const CONNECTIONS_PATH: &str = "/llu/connections";

// Fixed headers the LibreLinkUp endpoints expect on every request.
const HEADER_CONTENT_TYPE: (&str, &str) = ("Content-type", "application/json");
const HEADER_PRODUCT: (&str, &str) = ("product", "llu.android");
const HEADER_VERSION: (&str, &str) = ("version", "4.7");

/// One mmol/L of glucose is 18.01559 mg/dL.
const MG_DL_PER_MMOL_L: f64 = 18.01559;

// ── Data types ──────────────────────────────────────────────────────

/// Latest glucose measurement plus the patient's target band, rebuilt from
/// scratch on every poll. Either all fields parse or the fetch fails.
#[derive(Debug, Clone)]
pub struct GlucoseReading {
    pub value: f32,
    pub timestamp: String,
    pub trend: TrendArrow,
    pub color: MeasurementColor,
    pub units: GlucoseUnits,
    pub target_low: f32,
    pub target_high: f32,
}

/// Server-assigned color class for the current measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementColor {
    Green,
    Yellow,
    Orange,
    Red,
    /// Code outside 1..=4; rendered in a neutral color.
    Unknown,
}

impl MeasurementColor {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => MeasurementColor::Green,
            2 => MeasurementColor::Yellow,
            3 => MeasurementColor::Orange,
            4 => MeasurementColor::Red,
            _ => MeasurementColor::Unknown,
        }
    }
}

/// Units the account is configured for. Display label only: raw values are
/// shown as the server sent them unless conversion is explicitly requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlucoseUnits {
    MmolPerL,
    MgPerDl,
}

impl GlucoseUnits {
    pub fn from_flag(flag: i64) -> Self {
        if flag == 0 {
            GlucoseUnits::MmolPerL
        } else {
            GlucoseUnits::MgPerDl
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GlucoseUnits::MmolPerL => "mmol/l",
            GlucoseUnits::MgPerDl => "mg/dL",
        }
    }
}

/// Failure classes the poll loop branches on.
#[derive(Debug)]
pub enum ApiError {
    /// 401/403: bad credentials or an expired token.
    Auth,
    /// Any other non-200 status.
    Http(u16),
    /// Transport-level failure (DNS, TLS, socket, timeout).
    Network(anyhow::Error),
    /// Response body did not match the expected shape.
    Parse(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Auth => write!(f, "authorization rejected"),
            ApiError::Http(status) => write!(f, "HTTP error: status {}", status),
            ApiError::Network(e) => write!(f, "network error: {}", e),
            ApiError::Parse(msg) => write!(f, "unexpected response: {}", msg),
        }
    }
}

fn status_error(status: u16) -> ApiError {
    match status {
        401 | 403 => ApiError::Auth,
        s => ApiError::Http(s),
    }
}

// ── LibreLinkUp JSON structures ─────────────────────────────────────

#[derive(Deserialize)]
struct LoginRoot {
    data: Option<LoginData>,
}

#[derive(Deserialize)]
struct LoginData {
    #[serde(rename = "authTicket")]
    auth_ticket: Option<AuthTicket>,
}

#[derive(Deserialize)]
struct AuthTicket {
    token: Option<String>,
}

#[derive(Deserialize)]
struct ConnectionsRoot {
    data: Option<Vec<Connection>>,
}

#[derive(Deserialize)]
struct Connection {
    #[serde(rename = "glucoseMeasurement")]
    glucose_measurement: Option<Measurement>,
    #[serde(rename = "targetLow")]
    target_low: Option<f64>,
    #[serde(rename = "targetHigh")]
    target_high: Option<f64>,
}

#[derive(Deserialize)]
struct Measurement {
    #[serde(rename = "Value")]
    value: Option<f64>,
    #[serde(rename = "Timestamp")]
    timestamp: Option<String>,
    #[serde(rename = "TrendArrow")]
    trend_arrow: Option<i64>,
    #[serde(rename = "MeasurementColor")]
    measurement_color: Option<i64>,
    #[serde(rename = "GlucoseUnits")]
    glucose_units: Option<i64>,
}

// ── Unit conversion ─────────────────────────────────────────────────

/// Convert a raw mg/dL value to mmol/L, rounded to two decimals. Optional
/// display step; the loop only applies it when configured to.
pub fn mg_dl_to_mmol_l(mg_dl: f32) -> f32 {
    let mmol = mg_dl as f64 / MG_DL_PER_MMOL_L;
    ((mmol * 100.0).round() / 100.0) as f32
}

// ── Parsing ─────────────────────────────────────────────────────────

pub fn parse_login(json: &str) -> Result<String, ApiError> {
    let root: LoginRoot =
        serde_json::from_str(json).map_err(|e| ApiError::Parse(e.to_string()))?;
    root.data
        .and_then(|d| d.auth_ticket)
        .and_then(|t| t.token)
        .ok_or_else(|| ApiError::Parse("missing data.authTicket.token".to_string()))
}

pub fn parse_connections(json: &str) -> Result<GlucoseReading, ApiError> {
    let root: ConnectionsRoot =
        serde_json::from_str(json).map_err(|e| ApiError::Parse(e.to_string()))?;

    let connection = root
        .data
        .and_then(|mut d| if d.is_empty() { None } else { Some(d.remove(0)) })
        .ok_or_else(|| ApiError::Parse("empty connections array".to_string()))?;

    let measurement = connection
        .glucose_measurement
        .ok_or_else(|| ApiError::Parse("missing glucoseMeasurement".to_string()))?;

    let missing = |key: &str| ApiError::Parse(format!("missing glucoseMeasurement.{}", key));

    Ok(GlucoseReading {
        value: measurement.value.ok_or_else(|| missing("Value"))? as f32,
        timestamp: measurement.timestamp.ok_or_else(|| missing("Timestamp"))?,
        trend: TrendArrow::from_code(
            measurement.trend_arrow.ok_or_else(|| missing("TrendArrow"))?,
        ),
        color: MeasurementColor::from_code(
            measurement
                .measurement_color
                .ok_or_else(|| missing("MeasurementColor"))?,
        ),
        units: GlucoseUnits::from_flag(
            measurement
                .glucose_units
                .ok_or_else(|| missing("GlucoseUnits"))?,
        ),
        target_low: connection
            .target_low
            .ok_or_else(|| ApiError::Parse("missing targetLow".to_string()))? as f32,
        target_high: connection
            .target_high
            .ok_or_else(|| ApiError::Parse("missing targetHigh".to_string()))?
            as f32,
    })
}

// ── Endpoints ───────────────────────────────────────────────────────

/// Exchange account credentials for a bearer token.
pub fn login(base: &str, email: &str, password: &str) -> Result<String, ApiError> {
    let url = format!("{}{}", base, LOGIN_PATH);
    let body = serde_json::json!({
        "email": email,
        "password": password,
    })
    .to_string();
    let headers = [HEADER_CONTENT_TYPE, HEADER_PRODUCT, HEADER_VERSION];

    info!("Logging in to {}...", base);
    let response =
        http_client::https_post_json(&url, &headers, &body).map_err(ApiError::Network)?;
    if response.status != 200 {
        return Err(status_error(response.status));
    }

    let token = parse_login(&response.body)?;
    info!("Login OK, received API token (<{} chars>)", token.len());
    Ok(token)
}

/// Fetch the latest reading for the first connection on the account.
pub fn fetch_glucose(base: &str, token: &str) -> Result<GlucoseReading, ApiError> {
    let url = format!("{}{}", base, CONNECTIONS_PATH);
    let bearer = format!("Bearer {}", token);
    let headers = [
        HEADER_CONTENT_TYPE,
        HEADER_PRODUCT,
        HEADER_VERSION,
        ("Authorization", bearer.as_str()),
    ];

    let response = http_client::https_get(&url, &headers).map_err(ApiError::Network)?;
    if response.status != 200 {
        return Err(status_error(response.status));
    }

    parse_connections(&response.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTIONS_JSON: &str = r#"{
        "data": [{
            "glucoseMeasurement": {
                "Value": 5.6,
                "Timestamp": "2/6/2026 9:15:04 AM",
                "TrendArrow": 3,
                "MeasurementColor": 1,
                "GlucoseUnits": 0
            },
            "targetLow": 4.0,
            "targetHigh": 7.8
        }]
    }"#;

    #[test]
    fn parse_login_extracts_token() {
        let json = r#"{"data":{"authTicket":{"token":"abc123","expires":1769999999}}}"#;
        assert_eq!(parse_login(json).unwrap(), "abc123");
    }

    #[test]
    fn parse_login_without_ticket_is_parse_error() {
        let json = r#"{"data":{}}"#;
        assert!(matches!(parse_login(json), Err(ApiError::Parse(_))));
    }

    #[test]
    fn parse_connections_extracts_all_fields() {
        let reading = parse_connections(CONNECTIONS_JSON).unwrap();
        assert_eq!(reading.value, 5.6);
        assert_eq!(reading.timestamp, "2/6/2026 9:15:04 AM");
        assert_eq!(reading.trend, TrendArrow::Steady);
        assert_eq!(reading.color, MeasurementColor::Green);
        assert_eq!(reading.units, GlucoseUnits::MmolPerL);
        assert_eq!(reading.target_low, 4.0);
        assert_eq!(reading.target_high, 7.8);
    }

    #[test]
    fn parse_connections_with_missing_field_is_parse_error() {
        let json = r#"{
            "data": [{
                "glucoseMeasurement": {
                    "Value": 5.6,
                    "Timestamp": "t",
                    "TrendArrow": 3,
                    "MeasurementColor": 1
                },
                "targetLow": 4.0,
                "targetHigh": 7.8
            }]
        }"#;
        match parse_connections(json) {
            Err(ApiError::Parse(msg)) => assert!(msg.contains("GlucoseUnits")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn parse_connections_with_no_connections_is_parse_error() {
        assert!(matches!(
            parse_connections(r#"{"data":[]}"#),
            Err(ApiError::Parse(_))
        ));
    }

    #[test]
    fn auth_statuses_classify_separately_from_other_http_errors() {
        assert!(matches!(status_error(401), ApiError::Auth));
        assert!(matches!(status_error(403), ApiError::Auth));
        assert!(matches!(status_error(429), ApiError::Http(429)));
        assert!(matches!(status_error(500), ApiError::Http(500)));
    }

    #[test]
    fn units_flag_zero_is_mmol() {
        assert_eq!(GlucoseUnits::from_flag(0).label(), "mmol/l");
        assert_eq!(GlucoseUnits::from_flag(1).label(), "mg/dL");
        assert_eq!(GlucoseUnits::from_flag(7).label(), "mg/dL");
    }

    #[test]
    fn color_codes_map_with_explicit_default() {
        assert_eq!(MeasurementColor::from_code(1), MeasurementColor::Green);
        assert_eq!(MeasurementColor::from_code(2), MeasurementColor::Yellow);
        assert_eq!(MeasurementColor::from_code(3), MeasurementColor::Orange);
        assert_eq!(MeasurementColor::from_code(4), MeasurementColor::Red);
        assert_eq!(MeasurementColor::from_code(0), MeasurementColor::Unknown);
        assert_eq!(MeasurementColor::from_code(5), MeasurementColor::Unknown);
    }

    #[test]
    fn mg_dl_converts_to_mmol_rounded_to_two_decimals() {
        assert_eq!(mg_dl_to_mmol_l(100.0), 5.55);
        assert_eq!(mg_dl_to_mmol_l(180.0), 9.99);
        assert_eq!(mg_dl_to_mmol_l(0.0), 0.0);
    }
}
