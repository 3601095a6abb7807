use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Withholding-tax brackets for fixed income: (max holding days inclusive, rate).
const BRACKETS: [(i64, Decimal); 3] = [(180, dec!(0.225)), (360, dec!(0.200)), (720, dec!(0.175))];

/// Rate applied after the last bracket.
const LONG_TERM_RATE: Decimal = dec!(0.150);

/// Maps a holding period to the fixed-income withholding rate.
///
/// Pure: no state, no I/O, no error conditions. Non-positive holding
/// periods fall in the first bracket.
pub struct TaxService;

impl TaxService {
    pub fn rate_for_days(holding_days: i64) -> Decimal {
        BRACKETS
            .iter()
            .find(|(max_days, _)| holding_days <= *max_days)
            .map(|(_, rate)| *rate)
            .unwrap_or(LONG_TERM_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_boundaries_are_inclusive() {
        assert_eq!(TaxService::rate_for_days(180), dec!(0.225));
        assert_eq!(TaxService::rate_for_days(181), dec!(0.200));
        assert_eq!(TaxService::rate_for_days(360), dec!(0.200));
        assert_eq!(TaxService::rate_for_days(361), dec!(0.175));
        assert_eq!(TaxService::rate_for_days(720), dec!(0.175));
        assert_eq!(TaxService::rate_for_days(721), dec!(0.150));
    }

    #[test]
    fn same_day_redemption_pays_highest_rate() {
        assert_eq!(TaxService::rate_for_days(0), dec!(0.225));
    }
}
