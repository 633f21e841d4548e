use crate::model::{AnalysisResult, AthRecord, ConfigError, IndexData, Recommendation};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

/// Smallest and largest accepted tier increment, in percent.
pub const MIN_INCREMENT: u32 = 1;
pub const MAX_INCREMENT: u32 = 100;

/// Buckets the drop below an all-time high into tiers of `increment` percent.
#[derive(Debug, Clone, Copy)]
pub struct DropAnalyzer {
    increment: u32,
}

impl DropAnalyzer {
    pub fn new(drop_increment: u32) -> Result<Self, ConfigError> {
        if !(MIN_INCREMENT..=MAX_INCREMENT).contains(&drop_increment) {
            return Err(ConfigError::InvalidConfiguration(format!(
                "drop_increment must be between {} and {}, got {}",
                MIN_INCREMENT, MAX_INCREMENT, drop_increment
            )));
        }
        Ok(Self {
            increment: drop_increment,
        })
    }

    pub fn increment(&self) -> u32 {
        self.increment
    }

    /// Compares the observation against the prior ATH.
    ///
    /// Returns a new record only when the observation sets a new high (or no
    /// prior record exists); the caller is responsible for persisting it.
    pub fn analyze(
        &self,
        data: &IndexData,
        prior: Option<&AthRecord>,
    ) -> (AnalysisResult, Option<AthRecord>) {
        let current = data.current_price;

        let prior = match prior {
            None => {
                info!(
                    "No ATH record for {}, initializing with current price {:.2}",
                    data.symbol, current
                );
                return Self::new_high(data);
            }
            Some(p) if current > p.ath_value => {
                info!(
                    "New ATH for {}: {:.2} (previous: {:.2})",
                    data.symbol, current, p.ath_value
                );
                return Self::new_high(data);
            }
            Some(p) => p,
        };

        let gap_percent = Self::gap_percent(current, prior.ath_value);
        let drop_tier = self.drop_tier(gap_percent);
        let recommendation = if drop_tier > 0 {
            Recommendation::Buy
        } else {
            Recommendation::Hold
        };

        info!(
            "{}: current={:.2}, ATH={:.2}, gap={:.2}%, tier={}%, rec={}",
            data.symbol,
            current,
            prior.ath_value,
            gap_percent,
            drop_tier,
            recommendation.as_str()
        );

        let result = AnalysisResult {
            symbol: data.symbol,
            current_price: current,
            ath_value: prior.ath_value,
            ath_date: prior.ath_date,
            gap_percent,
            drop_tier,
            recommendation,
            is_new_ath: false,
        };
        (result, None)
    }

    /// Signed percentage distance from the ATH, rounded to two places with
    /// banker's rounding. A zero ATH yields zero.
    ///
    /// Magnitudes beyond `Decimal`'s range saturate to `Decimal::MIN` or
    /// `Decimal::MAX` instead of panicking.
    pub fn gap_percent(current: Decimal, ath: Decimal) -> Decimal {
        if ath.is_zero() {
            return Decimal::ZERO;
        }
        let exact = current
            .checked_sub(ath)
            .and_then(|diff| diff.checked_mul(Decimal::ONE_HUNDRED))
            .and_then(|scaled| scaled.checked_div(ath));
        // Ratio form loses a little precision but covers huge differences.
        let gap = exact.or_else(|| {
            current
                .checked_div(ath)?
                .checked_sub(Decimal::ONE)?
                .checked_mul(Decimal::ONE_HUNDRED)
        });

        match gap {
            Some(gap) => gap.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
            None if current < ath => Decimal::MIN,
            None => Decimal::MAX,
        }
    }

    /// Largest multiple of the increment reached by the drop magnitude.
    ///
    /// -4.99 -> 0, -5.00 -> 5, -12.30 -> 10 (increment 5). Tiers past
    /// `u32::MAX` saturate to the largest multiple that fits.
    pub fn drop_tier(&self, gap_percent: Decimal) -> u32 {
        if gap_percent >= Decimal::ZERO {
            return 0;
        }
        let increment = Decimal::from(self.increment);
        let tiers = (gap_percent.abs() / increment).trunc();
        tiers
            .checked_mul(increment)
            .and_then(|tier| tier.to_u32())
            .unwrap_or(u32::MAX - u32::MAX % self.increment)
    }

    fn new_high(data: &IndexData) -> (AnalysisResult, Option<AthRecord>) {
        let record = AthRecord {
            symbol: data.symbol,
            ath_value: data.current_price,
            ath_date: data.market_date,
            updated_at: Utc::now(),
        };
        let result = AnalysisResult {
            symbol: data.symbol,
            current_price: data.current_price,
            ath_value: data.current_price,
            ath_date: data.market_date,
            gap_percent: Decimal::ZERO,
            drop_tier: 0,
            recommendation: Recommendation::Hold,
            is_new_ath: true,
        };
        (result, Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexSymbol;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn observation(price: Decimal) -> IndexData {
        IndexData {
            symbol: IndexSymbol::Sp500,
            current_price: price,
            fetched_at: Utc::now(),
            market_date: date(2024, 3, 15),
        }
    }

    fn ath(value: Decimal) -> AthRecord {
        AthRecord {
            symbol: IndexSymbol::Sp500,
            ath_value: value,
            ath_date: date(2024, 1, 10),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_out_of_range_increments() {
        assert!(matches!(
            DropAnalyzer::new(0),
            Err(ConfigError::InvalidConfiguration(_))
        ));
        assert!(DropAnalyzer::new(101).is_err());
        assert!(DropAnalyzer::new(1).is_ok());
        assert!(DropAnalyzer::new(100).is_ok());
    }

    #[test]
    fn five_percent_drop_is_a_buy() {
        let analyzer = DropAnalyzer::new(5).unwrap();
        let prior = ath(dec!(6000.00));
        let (result, new_ath) = analyzer.analyze(&observation(dec!(5700.00)), Some(&prior));

        assert_eq!(result.gap_percent, dec!(-5.00));
        assert_eq!(result.drop_tier, 5);
        assert_eq!(result.recommendation, Recommendation::Buy);
        assert!(!result.is_new_ath);
        assert_eq!(result.ath_value, dec!(6000.00));
        assert_eq!(result.ath_date, prior.ath_date);
        assert!(new_ath.is_none());
    }

    #[test]
    fn small_drop_holds() {
        let analyzer = DropAnalyzer::new(5).unwrap();
        let (result, new_ath) =
            analyzer.analyze(&observation(dec!(5850.00)), Some(&ath(dec!(6000.00))));

        assert_eq!(result.gap_percent, dec!(-2.50));
        assert_eq!(result.drop_tier, 0);
        assert_eq!(result.recommendation, Recommendation::Hold);
        assert!(new_ath.is_none());
    }

    #[test]
    fn higher_price_sets_new_ath() {
        let analyzer = DropAnalyzer::new(5).unwrap();
        let (result, new_ath) =
            analyzer.analyze(&observation(dec!(6100.00)), Some(&ath(dec!(6000.00))));

        assert!(result.is_new_ath);
        assert_eq!(result.gap_percent, Decimal::ZERO);
        assert_eq!(result.drop_tier, 0);
        assert_eq!(result.recommendation, Recommendation::Hold);
        assert_eq!(result.ath_value, dec!(6100.00));

        let record = new_ath.expect("new ATH record");
        assert_eq!(record.ath_value, dec!(6100.00));
        assert_eq!(record.ath_date, date(2024, 3, 15));
    }

    #[test]
    fn equal_price_is_not_a_new_ath() {
        let analyzer = DropAnalyzer::new(5).unwrap();
        let (result, new_ath) =
            analyzer.analyze(&observation(dec!(6000.00)), Some(&ath(dec!(6000.00))));

        assert!(!result.is_new_ath);
        assert_eq!(result.gap_percent, dec!(0.00));
        assert_eq!(result.recommendation, Recommendation::Hold);
        assert!(new_ath.is_none());
    }

    #[test]
    fn first_observation_becomes_ath() {
        let analyzer = DropAnalyzer::new(5).unwrap();
        let (result, new_ath) = analyzer.analyze(&observation(dec!(5700.00)), None);

        assert!(result.is_new_ath);
        assert_eq!(result.recommendation, Recommendation::Hold);
        assert_eq!(result.ath_value, dec!(5700.00));
        assert_eq!(new_ath.map(|r| r.ath_value), Some(dec!(5700.00)));
    }

    #[test]
    fn ten_percent_increment_floors_to_tier() {
        let analyzer = DropAnalyzer::new(10).unwrap();
        assert_eq!(analyzer.drop_tier(dec!(-25.50)), 20);
        assert_eq!(analyzer.drop_tier(dec!(-9.99)), 0);
        assert_eq!(analyzer.drop_tier(dec!(-10.00)), 10);
    }

    #[test]
    fn boundary_gap_belongs_to_its_tier() {
        let analyzer = DropAnalyzer::new(5).unwrap();
        assert_eq!(analyzer.drop_tier(dec!(-4.99)), 0);
        assert_eq!(analyzer.drop_tier(dec!(-5.00)), 5);
        assert_eq!(analyzer.drop_tier(dec!(-12.30)), 10);
        assert_eq!(analyzer.drop_tier(dec!(3.00)), 0);
    }

    #[test]
    fn gap_uses_bankers_rounding() {
        // -20.05 / 1000 -> -2.005% and -20.15 / 1000 -> -2.015%
        assert_eq!(
            DropAnalyzer::gap_percent(dec!(979.95), dec!(1000)),
            dec!(-2.00)
        );
        assert_eq!(
            DropAnalyzer::gap_percent(dec!(979.85), dec!(1000)),
            dec!(-2.02)
        );
        assert_eq!(
            DropAnalyzer::gap_percent(dec!(5000), dec!(6000)),
            dec!(-16.67)
        );
    }

    #[test]
    fn zero_ath_yields_zero_gap() {
        assert_eq!(DropAnalyzer::gap_percent(dec!(10), Decimal::ZERO), Decimal::ZERO);

        let analyzer = DropAnalyzer::new(5).unwrap();
        let (result, _) = analyzer.analyze(&observation(Decimal::ZERO), Some(&ath(Decimal::ZERO)));
        assert_eq!(result.gap_percent, Decimal::ZERO);
        assert_eq!(result.recommendation, Recommendation::Hold);
    }

    #[test]
    fn extreme_magnitudes_saturate_instead_of_panicking() {
        assert_eq!(DropAnalyzer::gap_percent(Decimal::MAX, dec!(0.5)), Decimal::MAX);
        assert_eq!(DropAnalyzer::gap_percent(Decimal::MIN, dec!(0.5)), Decimal::MIN);
        assert_eq!(DropAnalyzer::gap_percent(dec!(1), Decimal::MAX), dec!(-100));

        let analyzer = DropAnalyzer::new(7).unwrap();
        let tier = analyzer.drop_tier(Decimal::MIN);
        assert!(tier > 0);
        assert_eq!(tier % 7, 0);
        assert!(tier > u32::MAX - 7);
    }

    #[test]
    fn huge_drop_is_still_a_buy() {
        let analyzer = DropAnalyzer::new(5).unwrap();
        let (result, _) =
            analyzer.analyze(&observation(Decimal::MIN), Some(&ath(dec!(0.5))));

        assert_eq!(result.gap_percent, Decimal::MIN);
        assert_eq!(result.recommendation, Recommendation::Buy);
        assert_eq!(result.drop_tier, u32::MAX);
    }
}
