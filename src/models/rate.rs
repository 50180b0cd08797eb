//! Extracted rate records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::numeric::is_plausible;

/// Metal a rate is quoted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metal {
    Gold,
    Silver,
}

impl Metal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Silver => "silver",
        }
    }

    /// Detect the metal named in a label, gold taking precedence.
    pub fn detect(label: &str) -> Option<Self> {
        let lower = label.to_lowercase();
        if lower.contains("gold") || lower.contains("xau") {
            Some(Self::Gold)
        } else if lower.contains("silver") || lower.contains("xag") {
            Some(Self::Silver)
        } else {
            None
        }
    }

    /// Denomination the source quotes this metal in.
    pub fn default_unit(&self) -> &'static str {
        match self {
            Self::Gold => "per 10 grams",
            Self::Silver => "per kg",
        }
    }
}

/// Denomination of international spot quotes.
pub const SPOT_UNIT: &str = "per troy ounce";

impl std::fmt::Display for Metal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extraction method that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateSource {
    Table,
    Div,
    Script,
    Api,
    BrowserTable,
    BrowserText,
    BrowserJson,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Div => "div",
            Self::Script => "script",
            Self::Api => "api",
            Self::BrowserTable => "browser-table",
            Self::BrowserText => "browser-text",
            Self::BrowserJson => "browser-json",
        }
    }
}

/// Numeric columns of a quote. Every field is optional because source layouts vary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateFields {
    pub m_rate: Option<f64>,
    pub premium: Option<f64>,
    pub sell: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
}

impl RateFields {
    fn values(&self) -> [Option<f64>; 7] {
        [
            self.m_rate,
            self.premium,
            self.sell,
            self.bid,
            self.ask,
            self.high,
            self.low,
        ]
    }

    fn values_mut(&mut self) -> [&mut Option<f64>; 7] {
        [
            &mut self.m_rate,
            &mut self.premium,
            &mut self.sell,
            &mut self.bid,
            &mut self.ask,
            &mut self.high,
            &mut self.low,
        ]
    }

    /// Drop every field outside the plausibility window.
    /// Returns the number of fields removed.
    pub fn retain_plausible(&mut self) -> usize {
        let mut dropped = 0;
        for slot in self.values_mut() {
            if let Some(v) = *slot {
                if !is_plausible(v) {
                    *slot = None;
                    dropped += 1;
                }
            }
        }
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.values().iter().all(Option::is_none)
    }

    /// The headline value of the quote: sell, then market rate, then bid/ask.
    pub fn primary(&self) -> Option<f64> {
        self.sell
            .or(self.m_rate)
            .or(self.bid)
            .or(self.ask)
            .or(self.high)
            .or(self.low)
            .or(self.premium)
    }
}

/// One structured quote for a metal/purity/category combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    pub metal: Metal,
    /// Free-form classification, e.g. `gold_auction`, `silver_spot`.
    pub category: String,
    /// Raw label text as found in the source.
    pub product: String,
    #[serde(flatten)]
    pub fields: RateFields,
    /// Quoted denomination. Differs by metal; callers convert.
    pub unit: String,
    /// Time of extraction, not of the source data.
    pub last_updated: DateTime<Utc>,
    pub source: RateSource,
}

impl RateRecord {
    /// Build a record, enforcing the plausibility invariant.
    ///
    /// Implausible fields are dropped; `None` is returned when nothing survives.
    pub fn new(
        metal: Metal,
        category: impl Into<String>,
        product: impl Into<String>,
        mut fields: RateFields,
        source: RateSource,
    ) -> Option<Self> {
        fields.retain_plausible();
        if fields.is_empty() {
            return None;
        }
        Some(Self {
            metal,
            category: category.into(),
            product: product.into().trim().to_string(),
            fields,
            unit: metal.default_unit().to_string(),
            last_updated: Utc::now(),
            source,
        })
    }

    /// Override the quoted unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Key for dropping exact repeats across strategies.
    pub fn dedup_key(&self) -> (Metal, u64) {
        let value = self.fields.primary().unwrap_or_default();
        (self.metal, value.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metal_detect() {
        assert_eq!(Metal::detect("Gold 99.50"), Some(Metal::Gold));
        assert_eq!(Metal::detect("SILVER 999"), Some(Metal::Silver));
        assert_eq!(Metal::detect("XAU/USD"), Some(Metal::Gold));
        assert_eq!(Metal::detect("Platinum"), None);
    }

    #[test]
    fn test_record_drops_implausible_fields() {
        let fields = RateFields {
            bid: Some(6200.0),
            ask: Some(6300.0),
            high: Some(3.0),
            low: Some(900_000.0),
            ..Default::default()
        };
        let record =
            RateRecord::new(Metal::Gold, "gold_market", "Gold", fields, RateSource::Table).unwrap();
        assert_eq!(record.fields.bid, Some(6200.0));
        assert_eq!(record.fields.high, None);
        assert_eq!(record.fields.low, None);
    }

    #[test]
    fn test_record_rejected_when_nothing_plausible() {
        let fields = RateFields {
            bid: Some(12.0),
            ..Default::default()
        };
        assert!(RateRecord::new(Metal::Silver, "x", "y", fields, RateSource::Div).is_none());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let fields = RateFields {
            m_rate: Some(6250.0),
            ..Default::default()
        };
        let record =
            RateRecord::new(Metal::Gold, "gold_auction", "Gold", fields, RateSource::BrowserTable)
                .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["mRate"], 6250.0);
        assert_eq!(json["source"], "browser-table");
        assert_eq!(json["metal"], "gold");
        assert!(json.get("lastUpdated").is_some());
    }
}
