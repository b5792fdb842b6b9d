//! Inspection records as stored by the intake workflow.
//!
//! The field names follow the JSON written by the intake form, so records read
//! from the record store deserialize directly into [`InspectionRecord`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Prefix shared by every generated serial number.
pub const SERIAL_PREFIX: &str = "SAS";

/// Timestamp-derived serial identifier of an inspection.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialNumber(String);

impl SerialNumber {
    /// Derives a serial from the submission time, e.g. `SAS20250124_093000`.
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        Self(format!(
            "{}{}",
            SERIAL_PREFIX,
            timestamp.format("%Y%m%d_%H%M%S")
        ))
    }

    /// Wraps an existing serial.
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    /// Returns the serial as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Warranty term as submitted: a bare number or free text such as `"24 months"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTerm {
    /// Numeric form value.
    Months(i64),
    /// Text form value.
    Text(String),
}

impl RawTerm {
    /// Returns the value as text for term parsing.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Months(months) => Cow::Owned(months.to_string()),
            Self::Text(text) => Cow::Borrowed(text),
        }
    }
}

/// Locations of the artifacts produced for a record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLinks {
    /// Public location of the rendered PDF.
    pub pdf_url: Option<String>,
    /// Public location of the QR code image.
    pub qr_url: Option<String>,
}

/// Structured data captured for one inspected gear motor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionRecord {
    pub serial: Option<SerialNumber>,
    pub date: Option<String>,
    pub product_type: Option<String>,
    pub motor_nameplate: Option<String>,
    pub motor_current: Option<String>,
    pub gear_ratio: Option<String>,
    pub gear_sound: Option<String>,
    pub oil_type: Option<String>,
    pub oil_liters: Option<String>,
    pub oil_filled: Option<bool>,
    pub check_complete: Option<String>,
    pub incomplete_reason: Option<String>,
    pub warranty: Option<RawTerm>,
    pub inspector: Option<String>,
    /// Image slot name to resolved image location.
    pub images: BTreeMap<String, Option<String>>,
    #[serde(flatten)]
    pub artifacts: ArtifactLinks,
}

impl InspectionRecord {
    /// Returns the product classification derived from `product_type`.
    pub fn product_class(&self) -> ProductClass {
        ProductClass::classify(self.product_type.as_deref().unwrap_or_default())
    }

    /// Returns the warranty term as text, if any was submitted.
    pub fn warranty_text(&self) -> Option<Cow<'_, str>> {
        self.warranty.as_ref().map(RawTerm::as_text)
    }

    /// Iterates over slots that carry a non-empty image location.
    pub fn resolved_images(&self) -> impl Iterator<Item = (&str, &str)> {
        self.images.iter().filter_map(|(slot, location)| {
            location
                .as_deref()
                .map(str::trim)
                .filter(|location| !location.is_empty())
                .map(|location| (slot.as_str(), location))
        })
    }
}

/// Product families that change which fields a report shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductClass {
    /// Servo products ship without gear oil.
    Servo,
    /// AC/DC and BLDC gear motors need no oil filling.
    NoOilRequired,
    /// Everything else reports oil type, volume and fill status.
    Standard,
}

impl ProductClass {
    /// Classifies a product type by case-insensitive keyword; `servo` wins
    /// over the no-oil keywords.
    pub fn classify(product_type: &str) -> Self {
        let product_type = product_type.to_lowercase();
        if product_type.contains("servo") {
            Self::Servo
        } else if product_type.contains("ac/dc") || product_type.contains("bldc") {
            Self::NoOilRequired
        } else {
            Self::Standard
        }
    }

    /// Whether oil type, volume and fill status are reported.
    pub fn shows_oil_fields(self) -> bool {
        matches!(self, Self::Standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn serial_is_derived_from_timestamp() {
        let timestamp = NaiveDate::from_ymd_opt(2025, 1, 24)
            .unwrap()
            .and_hms_opt(9, 30, 5)
            .unwrap();
        assert_eq!(
            SerialNumber::from_timestamp(timestamp).as_str(),
            "SAS20250124_093005"
        );
    }

    #[test]
    fn servo_takes_precedence_over_no_oil_keywords() {
        assert_eq!(ProductClass::classify("BLDC Servo"), ProductClass::Servo);
        assert_eq!(ProductClass::classify("AC/DC motor"), ProductClass::NoOilRequired);
        assert_eq!(ProductClass::classify("bldc"), ProductClass::NoOilRequired);
        assert_eq!(ProductClass::classify("RF Helical"), ProductClass::Standard);
        assert_eq!(ProductClass::classify(""), ProductClass::Standard);
    }

    #[test]
    fn deserializes_intake_json() {
        let record: InspectionRecord = serde_json::from_str(
            r#"{
                "serial": "SAS20250124_093005",
                "date": "2025-01-24",
                "product_type": "RF",
                "warranty": 18,
                "oil_filled": true,
                "images": {
                    "motor_current_img": "https://example.com/a.jpg",
                    "gear_sound_img": null,
                    "assembly_img": "  "
                },
                "pdf_url": "https://example.com/r.pdf"
            }"#,
        )
        .unwrap();

        assert_eq!(record.warranty_text().as_deref(), Some("18"));
        assert_eq!(record.artifacts.pdf_url.as_deref(), Some("https://example.com/r.pdf"));
        let resolved: Vec<_> = record.resolved_images().collect();
        assert_eq!(resolved, vec![("motor_current_img", "https://example.com/a.jpg")]);
    }

    #[test]
    fn textual_warranty_is_kept_verbatim() {
        let record: InspectionRecord =
            serde_json::from_str(r#"{ "warranty": "24 months" }"#).unwrap();
        assert_eq!(record.warranty_text().as_deref(), Some("24 months"));
    }
}
