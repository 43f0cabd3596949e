//! Pricing record models
//!
//! One [`InsuranceService`] is the unit of work that travels from the line
//! decoder to exactly one worker. Field names follow the input JSON.
//!
//! Missing fields take their zero value instead of failing the line; the store
//! rejects a record whose values it cannot accept, and only that record.

use serde::{Deserialize, Deserializer, Serialize};

/// A billed service and every rate negotiated for it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InsuranceService {
    /// Arrangement type, e.g. "ffs", "bundle", "capitation"
    pub negotiation_arrangement: String,
    pub name: String,
    /// Code system, e.g. "CPT", "HCPCS", "MS-DRG"
    pub billing_code_type: String,
    pub billing_code_type_version: String,
    pub billing_code: String,
    /// Stored as NULL when absent
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub negotiated_rates: Vec<NegotiatedRate>,
}

/// A group of prices shared by the same set of providers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NegotiatedRate {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub provider_references: Vec<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub negotiated_prices: Vec<NegotiatedPrice>,
}

/// One concrete price point; persisted as one `negotiated_rates` row
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NegotiatedPrice {
    /// "negotiated" or "percentage"; the store rejects anything else
    pub negotiated_type: String,
    pub negotiated_rate: f64,
    /// ISO calendar date, "YYYY-MM-DD"
    pub expiration_date: String,
    #[serde(rename = "service_code", deserialize_with = "null_as_empty")]
    pub service_codes: Vec<String>,
    /// "professional" or "institutional"; the store rejects anything else
    pub billing_class: String,
}

impl InsuranceService {
    /// Number of rate rows this record produces when persisted
    pub fn price_count(&self) -> usize {
        self.negotiated_rates
            .iter()
            .map(|rate| rate.negotiated_prices.len())
            .sum()
    }
}

/// Treat an explicit `null` array the same as a missing one
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const OFFICE_VISIT: &str = r#"{"negotiation_arrangement":"ffs","name":"Office Visit","billing_code_type":"CPT","billing_code_type_version":"2024","billing_code":"99213","description":"","negotiated_rates":[{"provider_references":[101,102],"negotiated_prices":[{"negotiated_type":"negotiated","negotiated_rate":125.50,"expiration_date":"2025-12-31","service_code":["11","22"],"billing_class":"professional"}]}]}"#;

    #[test]
    fn test_deserialize_full_record() {
        let service: InsuranceService = serde_json::from_str(OFFICE_VISIT).unwrap();

        assert_eq!(service.name, "Office Visit");
        assert_eq!(service.billing_code, "99213");
        assert_eq!(service.description.as_deref(), Some(""));
        assert_eq!(service.negotiated_rates.len(), 1);

        let rate = &service.negotiated_rates[0];
        assert_eq!(rate.provider_references, vec![101, 102]);

        let price = &rate.negotiated_prices[0];
        assert_eq!(price.negotiated_rate, 125.5);
        assert_eq!(price.service_codes, vec!["11", "22"]);
        assert_eq!(price.billing_class, "professional");
        assert_eq!(service.price_count(), 1);
    }

    #[test]
    fn test_optional_and_null_fields_default() {
        let json = r#"{"negotiation_arrangement":"ffs","name":"Lab","billing_code_type":"CPT","billing_code_type_version":"2024","billing_code":"80053","negotiated_rates":null}"#;
        let service: InsuranceService = serde_json::from_str(json).unwrap();

        assert!(service.description.is_none());
        assert!(service.negotiated_rates.is_empty());
        assert_eq!(service.price_count(), 0);
    }

    #[test]
    fn test_missing_fields_take_zero_values() {
        let json = r#"{"negotiation_arrangement":"ffs","billing_code_type":"CPT","billing_code":"80053","negotiated_rates":[{"negotiated_prices":[{"negotiated_type":"negotiated","billing_class":"professional"}]}]}"#;
        let service: InsuranceService = serde_json::from_str(json).unwrap();

        assert_eq!(service.name, "");
        assert_eq!(service.billing_code_type_version, "");
        assert_eq!(service.billing_code, "80053");

        let price = &service.negotiated_rates[0].negotiated_prices[0];
        assert_eq!(price.negotiated_rate, 0.0);
        assert_eq!(price.expiration_date, "");
        assert!(service.negotiated_rates[0].provider_references.is_empty());
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let json = r#"{"name":"Lab","negotiated_rates":[{"negotiated_prices":[{"negotiated_rate":"cheap"}]}]}"#;
        assert!(serde_json::from_str::<InsuranceService>(json).is_err());
    }

    #[test]
    fn test_service_code_key_maps_to_service_codes() {
        let json = r#"{"negotiated_type":"percentage","negotiated_rate":80,"expiration_date":"9999-12-31","billing_class":"institutional"}"#;
        let price: NegotiatedPrice = serde_json::from_str(json).unwrap();
        assert!(price.service_codes.is_empty());

        let encoded = serde_json::to_value(&price).unwrap();
        assert!(encoded.get("service_code").is_some());
    }
}
