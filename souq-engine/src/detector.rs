use souq_core::{EngineError, EngineResult};

/// Discounts strictly above this percentage mark a listing as suspicious.
pub const SUSPICIOUS_DISCOUNT_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub discount_percentage: f64,
    pub is_suspicious: bool,
}

/// Classifies a new listing from its price pair. Pure; runs once at
/// creation and the result is never recomputed.
pub fn classify(original_price: f64, discounted_price: f64) -> EngineResult<Classification> {
    if original_price <= 0.0 {
        return Err(EngineError::Validation(
            "original price must be greater than 0".to_string(),
        ));
    }
    if discounted_price <= 0.0 {
        return Err(EngineError::Validation(
            "discounted price must be greater than 0".to_string(),
        ));
    }
    if discounted_price >= original_price {
        return Err(EngineError::Validation(
            "discounted price must be less than original price".to_string(),
        ));
    }

    let discount_percentage = (original_price - discounted_price) / original_price * 100.0;

    Ok(Classification {
        discount_percentage,
        // Strict inequality: exactly 80% is not suspicious.
        is_suspicious: discount_percentage > SUSPICIOUS_DISCOUNT_THRESHOLD,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_discount_is_suspicious() {
        let c = classify(100.0, 15.0).unwrap();
        assert_eq!(c.discount_percentage, 85.0);
        assert!(c.is_suspicious);
    }

    #[test]
    fn exactly_eighty_percent_is_clean() {
        let c = classify(100.0, 20.0).unwrap();
        assert_eq!(c.discount_percentage, 80.0);
        assert!(!c.is_suspicious);
    }

    #[test]
    fn modest_discount_is_clean() {
        let c = classify(80.0, 60.0).unwrap();
        assert_eq!(c.discount_percentage, 25.0);
        assert!(!c.is_suspicious);
    }

    #[test]
    fn rejects_bad_prices() {
        assert!(matches!(classify(0.0, 10.0), Err(EngineError::Validation(_))));
        assert!(matches!(classify(10.0, 0.0), Err(EngineError::Validation(_))));
        assert!(matches!(classify(10.0, 10.0), Err(EngineError::Validation(_))));
        assert!(matches!(classify(10.0, 12.0), Err(EngineError::Validation(_))));
    }
}
