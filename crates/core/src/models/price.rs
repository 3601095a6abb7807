use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::asset::AssetKey;

/// A current price resolved by a provider, in the asset's native currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub key: AssetKey,
    pub price: Decimal,
    /// Provider that produced the quote
    pub source: String,
}

/// One sample of a dated series (exchange rates, index rates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: Decimal,
}

/// Date-sorted series of samples with gaps on non-trading days.
///
/// Used for the USD→home exchange-rate history: lookups resolve to the
/// nearest sample at or before the requested date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatedSeries {
    points: Vec<DatedValue>,
}

impl DatedSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: impl IntoIterator<Item = DatedValue>) -> Self {
        let mut series = Self::new();
        series.merge(points);
        series
    }

    /// Insert or update a sample, keeping date order (O(log n) search).
    pub fn set(&mut self, date: NaiveDate, value: Decimal) {
        match self.points.binary_search_by_key(&date, |p| p.date) {
            Ok(idx) => self.points[idx].value = value,
            Err(idx) => self.points.insert(idx, DatedValue { date, value }),
        }
    }

    pub fn merge(&mut self, points: impl IntoIterator<Item = DatedValue>) {
        for point in points {
            self.set(point.date, point.value);
        }
    }

    /// Most recent sample dated at or before `date`.
    pub fn at_or_before(&self, date: NaiveDate) -> Option<DatedValue> {
        let end = self.points.partition_point(|p| p.date <= date);
        end.checked_sub(1).map(|idx| self.points[idx])
    }

    /// Whether the series holds a sample at or before `date` and also one at
    /// or after it, i.e. `at_or_before(date)` cannot change with more data.
    pub fn covers(&self, date: NaiveDate) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => first.date <= date && date <= last.date,
            _ => false,
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Samples dated within `[from, to)`.
    pub fn range(&self, from: NaiveDate, to: NaiveDate) -> &[DatedValue] {
        let start = self.points.partition_point(|p| p.date < from);
        let end = self.points.partition_point(|p| p.date < to);
        if start >= end {
            &[]
        } else {
            &self.points[start..end]
        }
    }
}

/// Price and exchange-rate lookups made during one portfolio calculation
/// (or one evolution run). Never shared across runs.
///
/// A stored `None` means "already asked, nothing available", which is
/// different from "not asked yet" (no entry).
#[derive(Debug, Default)]
pub struct ValuationCache {
    prices: HashMap<(AssetKey, Option<NaiveDate>), Option<Decimal>>,
    rates: HashMap<Option<NaiveDate>, Option<Decimal>>,
}

impl ValuationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `date = None` stands for the current price.
    pub fn price(&self, key: &AssetKey, date: Option<NaiveDate>) -> Option<Option<Decimal>> {
        self.prices.get(&(key.clone(), date)).copied()
    }

    pub fn set_price(&mut self, key: &AssetKey, date: Option<NaiveDate>, price: Option<Decimal>) {
        self.prices.insert((key.clone(), date), price);
    }

    pub fn has_price(&self, key: &AssetKey, date: Option<NaiveDate>) -> bool {
        self.prices.contains_key(&(key.clone(), date))
    }

    pub fn rate(&self, date: Option<NaiveDate>) -> Option<Option<Decimal>> {
        self.rates.get(&date).copied()
    }

    pub fn set_rate(&mut self, date: Option<NaiveDate>, rate: Option<Decimal>) {
        self.rates.insert(date, rate);
    }

    pub fn price_entries(&self) -> usize {
        self.prices.len()
    }
}
