use rust_decimal::Decimal;

use crate::store::document::{self, Document};

/// Live platform-wide settings, read from the single `settings/app` document.
///
/// The commission rate is read at the moment an order is submitted and then
/// frozen into that order; later edits never touch existing orders.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlatformSettings {
    pub commission_rate: Decimal,
}

impl PlatformSettings {
    pub fn new(commission_rate: Decimal) -> Self {
        Self { commission_rate }
    }

    /// Valid commission rates are fractions in `[0, 1]`.
    pub fn rate_in_range(rate: Decimal) -> bool {
        rate >= Decimal::ZERO && rate <= Decimal::ONE
    }

    /// Converts the settings document. The document is occasionally edited by
    /// hand, so this never fails: an absent, unreadable or out-of-range rate
    /// falls back to zero commission, with a warning for the operator.
    pub fn from_document(doc: &Document) -> Self {
        let rate = match document::get_decimal(doc, "commissionRate") {
            Some(rate) if Self::rate_in_range(rate) => rate,
            Some(rate) => {
                tracing::warn!(%rate, "commission rate outside [0, 1], charging none");
                Decimal::ZERO
            }
            None => {
                tracing::warn!("settings document has no readable commissionRate, charging none");
                Decimal::ZERO
            }
        };
        Self::new(rate)
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(
            "commissionRate".into(),
            self.commission_rate.to_string().into(),
        );
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn reads_float_and_string_rates() {
        let s = PlatformSettings::from_document(&doc(json!({ "commissionRate": 0.15 })));
        assert_eq!(s.commission_rate, Decimal::new(15, 2));
        let s = PlatformSettings::from_document(&doc(json!({ "commissionRate": "0.2" })));
        assert_eq!(s.commission_rate, Decimal::new(2, 1));
    }

    #[test]
    fn malformed_or_out_of_range_rates_charge_nothing() {
        for fixture in [
            json!({}),
            json!({ "commissionRate": "soon" }),
            json!({ "commissionRate": 1.5 }),
            json!({ "commissionRate": -0.1 }),
        ] {
            let s = PlatformSettings::from_document(&doc(fixture));
            assert_eq!(s.commission_rate, Decimal::ZERO);
        }
    }

    #[test]
    fn boundary_rates_are_accepted() {
        assert!(PlatformSettings::rate_in_range(Decimal::ZERO));
        assert!(PlatformSettings::rate_in_range(Decimal::ONE));
        assert!(!PlatformSettings::rate_in_range(Decimal::new(101, 2)));
    }
}
