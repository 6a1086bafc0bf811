//! Daily order-flow aggregation.
//!
//! Folds normalized order events into one running state per trading date.
//! Only aggregate side volumes and the last price are tracked; there is no
//! per-order or per-price-level book.

use chrono::NaiveDate;
use imbalance_core::{Action, DailyRow, DayState, NormalizedEvent, Side, Size};
use std::collections::BTreeMap;

/// Aggregator holding one `DayState` per observed date.
///
/// Events must be presented in chronological order within a day for
/// `last_price` to be the day's final price; the aggregator does not sort.
#[derive(Debug, Clone, Default)]
pub struct DailyAggregator {
    /// States by date.
    days: BTreeMap<NaiveDate, DayState>,
    /// Events applied.
    event_count: u64,
}

impl DailyAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event to the state of `date`, creating it if needed.
    ///
    /// | action                | effect on `side`'s volume       |
    /// |-----------------------|---------------------------------|
    /// | add, modify           | `+= size`                       |
    /// | cancel, trade, fill   | `= max(0, volume - size)`       |
    /// | clear book            | both volumes reset to 0         |
    /// | none                  | nothing                         |
    ///
    /// Modify adds its size rather than replacing the order's previous
    /// size, which is unknown without order tracking. A present price
    /// always becomes the day's last price. Negative or non-finite sizes
    /// count as 0 and non-finite prices are ignored.
    pub fn update(
        &mut self,
        date: NaiveDate,
        side: Side,
        size: Size,
        action: Action,
        price: Option<f64>,
    ) {
        let size = if size.is_finite() && size > 0.0 { size } else { 0.0 };
        let state = self.days.entry(date).or_default();

        match action {
            Action::Add | Action::Modify => {
                if let Some(volume) = side_volume(state, side) {
                    *volume += size;
                }
            }
            Action::Cancel | Action::Trade | Action::Fill => {
                if let Some(volume) = side_volume(state, side) {
                    *volume = (*volume - size).max(0.0);
                }
            }
            Action::ClearBook => {
                state.bid_volume = 0.0;
                state.ask_volume = 0.0;
            }
            Action::None => {}
        }

        if let Some(price) = price.filter(|p| p.is_finite()) {
            state.last_price = Some(price);
        }

        self.event_count += 1;
    }

    /// Apply a normalized event.
    #[inline]
    pub fn apply(&mut self, event: &NormalizedEvent) {
        self.update(event.date, event.side, event.size, event.action, event.price);
    }

    /// Apply events in order.
    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a NormalizedEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    /// State of a single date.
    pub fn day(&self, date: NaiveDate) -> Option<&DayState> {
        self.days.get(&date)
    }

    /// Iterate states in ascending date order.
    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, &DayState)> {
        self.days.iter().map(|(date, state)| (*date, state))
    }

    /// Number of dates observed.
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// Number of events applied.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Whether no event has been applied.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// One row per observed date in ascending order, with the derived
    /// imbalance and price change columns unset.
    ///
    /// Can be called at any point; the aggregator keeps accumulating.
    pub fn finalize(&self) -> Vec<DailyRow> {
        self.days
            .iter()
            .map(|(date, state)| DailyRow::from_state(*date, state))
            .collect()
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.days.clear();
        self.event_count = 0;
    }
}

/// The volume an event on `side` acts on.
#[inline]
fn side_volume(state: &mut DayState, side: Side) -> Option<&mut Size> {
    match side {
        Side::Bid => Some(&mut state.bid_volume),
        Side::Ask => Some(&mut state.ask_volume),
        Side::None => None,
    }
}
