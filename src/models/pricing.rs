use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldErrors};

const MAX_RATE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    pub base_fare: f64,
    pub per_km: f64,
    pub per_minute: f64,
    pub minimum_fare: f64,
    pub commission_percent: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            base_fare: 150.0,
            per_km: 25.0,
            per_minute: 5.0,
            minimum_fare: 200.0,
            commission_percent: 15.0,
        }
    }
}

impl PricingSettings {
    /// Range checks run before anything is sent to the backend.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();

        for (field, value) in [
            ("base_fare", self.base_fare),
            ("per_km", self.per_km),
            ("per_minute", self.per_minute),
            ("minimum_fare", self.minimum_fare),
            ("commission_percent", self.commission_percent),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.insert(field, "must be a non-negative number".to_string());
            } else if value > MAX_RATE {
                errors.insert(field, format!("must not exceed {MAX_RATE}"));
            }
        }

        if !errors.contains_key("commission_percent") && self.commission_percent > 100.0 {
            errors.insert("commission_percent", "must be between 0 and 100".to_string());
        }

        if !errors.contains_key("minimum_fare")
            && !errors.contains_key("base_fare")
            && self.minimum_fare < self.base_fare
        {
            errors.insert("minimum_fare", "must not be lower than base_fare".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PricingSettings;
    use crate::error::AppError;

    #[test]
    fn defaults_are_valid() {
        assert!(PricingSettings::default().validate().is_ok());
    }

    #[test]
    fn negative_and_out_of_range_values_are_reported_per_field() {
        let settings = PricingSettings {
            per_km: -1.0,
            commission_percent: 140.0,
            ..PricingSettings::default()
        };

        match settings.validate() {
            Err(AppError::Validation(fields)) => {
                assert!(fields.contains_key("per_km"));
                assert!(fields.contains_key("commission_percent"));
                assert_eq!(fields.len(), 2);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn minimum_fare_below_base_fare_is_rejected() {
        let settings = PricingSettings {
            base_fare: 300.0,
            minimum_fare: 100.0,
            ..PricingSettings::default()
        };

        match settings.validate() {
            Err(AppError::Validation(fields)) => assert!(fields.contains_key("minimum_fare")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn nan_is_not_a_price() {
        let settings = PricingSettings {
            base_fare: f64::NAN,
            ..PricingSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
