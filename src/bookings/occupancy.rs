//! Occupancy
//!
//! Headcount committed against a slot instant. Two models are supported:
//!
//! - [`OccupancyModel::ShadowSpillover`]: a booking occupies its own start
//!   instant, and a workshop additionally occupies the instant exactly one
//!   spillover period later.
//! - [`OccupancyModel::IntervalOverlap`]: a booking occupies every instant in
//!   `[start, start + duration)`, with a fixed duration per booking type.
//!
//! The model is chosen once in configuration and every surface uses it.

use jiff::{
    SignedDuration,
    civil::{Date, DateTime},
};
use serde::Deserialize;

use crate::{
    bookings::models::{Booking, BookingType},
    config::OccupancyConfig,
};

/// How a booking's headcount is attributed to slot instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyModel {
    /// Point-in-time: own instant, plus the spillover instant for workshops.
    #[default]
    ShadowSpillover,

    /// Continuous half-open interval of a per-type duration.
    IntervalOverlap,
}

/// Computes slot occupancy under a configured model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyCalculator {
    model: OccupancyModel,
    workshop: SignedDuration,
    sightseeing: SignedDuration,
    spillover: SignedDuration,
}

impl OccupancyCalculator {
    /// Build a calculator from the occupancy section of the configuration.
    #[must_use]
    pub fn new(config: &OccupancyConfig) -> Self {
        Self {
            model: config.model,
            workshop: SignedDuration::from_mins(i64::from(config.workshop_minutes)),
            sightseeing: SignedDuration::from_mins(i64::from(config.sightseeing_minutes)),
            spillover: SignedDuration::from_mins(i64::from(config.spillover_minutes)),
        }
    }

    /// The model in use.
    #[must_use]
    pub const fn model(&self) -> OccupancyModel {
        self.model
    }

    const fn duration(&self, kind: BookingType) -> SignedDuration {
        match kind {
            BookingType::Workshop => self.workshop,
            BookingType::Sightseeing => self.sightseeing,
        }
    }

    /// How far past its start a booking of `kind` can still occupy an instant.
    #[must_use]
    pub const fn reach(&self, kind: BookingType) -> SignedDuration {
        match (self.model, kind) {
            (OccupancyModel::ShadowSpillover, BookingType::Workshop) => self.spillover,
            (OccupancyModel::ShadowSpillover, BookingType::Sightseeing) => SignedDuration::ZERO,
            (OccupancyModel::IntervalOverlap, _) => self.duration(kind),
        }
    }

    /// The largest reach of any booking type.
    #[must_use]
    pub fn max_reach(&self) -> SignedDuration {
        self.reach(BookingType::Workshop)
            .max(self.reach(BookingType::Sightseeing))
    }

    /// Whether a booking of `kind` starting at `start` occupies instant `at`.
    #[must_use]
    pub fn covers(&self, kind: BookingType, start: DateTime, at: DateTime) -> bool {
        match self.model {
            OccupancyModel::ShadowSpillover => {
                if at == start {
                    return true;
                }

                kind == BookingType::Workshop
                    && start
                        .checked_add(self.spillover)
                        .is_ok_and(|spill| spill == at)
            }
            OccupancyModel::IntervalOverlap => {
                if at < start {
                    return false;
                }

                match start.checked_add(self.duration(kind)) {
                    Ok(end) => at < end,
                    Err(_) => true,
                }
            }
        }
    }

    /// Calendar dates a booking of `kind` starting at `start` can touch, in
    /// ascending order.
    #[must_use]
    pub fn footprint_dates(&self, kind: BookingType, start: DateTime) -> Vec<Date> {
        let first = start.date();
        let last = start
            .checked_add(self.reach(kind))
            .map_or(first, |end| end.date());

        date_span(first, last)
    }

    /// Calendar dates on which a booking reaching instant `at` may start.
    #[must_use]
    pub fn reaching_dates(&self, at: DateTime) -> Vec<Date> {
        let last = at.date();
        let first = at
            .checked_sub(self.max_reach())
            .map_or(last, |start| start.date());

        date_span(first, last)
    }

    /// Total headcount of non-cancelled `bookings` occupying instant `at`.
    pub fn occupancy<'a>(
        &self,
        bookings: impl IntoIterator<Item = &'a Booking>,
        at: DateTime,
    ) -> u32 {
        bookings
            .into_iter()
            .filter(|booking| booking.occupies())
            .filter(|booking| self.covers(booking.kind, booking.starts_at, at))
            .fold(0_u32, |total, booking| total.saturating_add(booking.party_size))
    }
}

/// Capacity left in a slot; never negative.
#[must_use]
pub const fn remaining(capacity: u32, occupied: u32) -> u32 {
    capacity.saturating_sub(occupied)
}

/// Every date from `first` to `last`, inclusive.
fn date_span(first: Date, last: Date) -> Vec<Date> {
    let mut dates = vec![first];
    let mut current = first;

    while current < last {
        match current.tomorrow() {
            Ok(next) => {
                dates.push(next);
                current = next;
            }
            Err(_) => break,
        }
    }

    dates
}

#[cfg(test)]
mod tests {
    use jiff::{Timestamp, civil::date};
    use rusty_money::{Money, iso::PLN};

    use crate::{
        bookings::models::{BookingStatus, BookingUuid},
        contact::CustomerInfo,
    };

    use super::*;

    fn calculator(model: OccupancyModel) -> OccupancyCalculator {
        OccupancyCalculator::new(&OccupancyConfig {
            model,
            ..OccupancyConfig::default()
        })
    }

    fn booking(kind: BookingType, hour: i8, minute: i8, party_size: u32) -> Booking {
        Booking {
            uuid: BookingUuid::new(),
            slot: None,
            starts_at: date(2026, 7, 1).at(hour, minute, 0, 0),
            kind,
            party_size,
            status: BookingStatus::Confirmed,
            unit_price: Money::from_minor(2_500, PLN),
            customer: CustomerInfo::new("Ada", "ada@example.com"),
            notes: None,
            reminder_sent_at: None,
            created_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn at(hour: i8, minute: i8) -> DateTime {
        date(2026, 7, 1).at(hour, minute, 0, 0)
    }

    #[test]
    fn workshop_spills_into_the_following_hour() {
        let calculator = calculator(OccupancyModel::ShadowSpillover);
        let bookings = [booking(BookingType::Workshop, 10, 0, 10)];

        assert_eq!(calculator.occupancy(&bookings, at(10, 0)), 10);
        assert_eq!(calculator.occupancy(&bookings, at(11, 0)), 10);
        assert_eq!(calculator.occupancy(&bookings, at(10, 15)), 0);
        assert_eq!(calculator.occupancy(&bookings, at(10, 45)), 0);
        assert_eq!(calculator.occupancy(&bookings, at(11, 15)), 0);
    }

    #[test]
    fn sightseeing_only_occupies_its_own_slot_without_intervals() {
        let calculator = calculator(OccupancyModel::ShadowSpillover);
        let bookings = [booking(BookingType::Sightseeing, 10, 0, 4)];

        assert_eq!(calculator.occupancy(&bookings, at(10, 0)), 4);
        assert_eq!(calculator.occupancy(&bookings, at(11, 0)), 0);
    }

    #[test]
    fn interval_model_covers_half_open_duration() {
        let calculator = calculator(OccupancyModel::IntervalOverlap);
        let bookings = [
            booking(BookingType::Workshop, 10, 0, 10),
            booking(BookingType::Sightseeing, 10, 30, 3),
        ];

        assert_eq!(calculator.occupancy(&bookings, at(9, 45)), 0);
        assert_eq!(calculator.occupancy(&bookings, at(10, 0)), 10);
        assert_eq!(calculator.occupancy(&bookings, at(10, 45)), 13);
        assert_eq!(calculator.occupancy(&bookings, at(11, 0)), 10);
        assert_eq!(calculator.occupancy(&bookings, at(11, 15)), 10);
        assert_eq!(calculator.occupancy(&bookings, at(11, 20)), 0);
    }

    #[test]
    fn cancelled_bookings_are_ignored() {
        let mut cancelled = booking(BookingType::Workshop, 10, 0, 10);
        cancelled.status = BookingStatus::Cancelled;

        for model in [OccupancyModel::ShadowSpillover, OccupancyModel::IntervalOverlap] {
            let calculator = calculator(model);

            assert_eq!(
                calculator.occupancy([&cancelled], at(10, 0)),
                0,
                "{model:?} counted a cancelled booking"
            );
        }
    }

    #[test]
    fn remaining_never_goes_negative() {
        assert_eq!(remaining(10, 4), 6);
        assert_eq!(remaining(10, 14), 0);
    }

    #[test]
    fn late_workshop_footprint_crosses_midnight() {
        let calculator = calculator(OccupancyModel::ShadowSpillover);

        let dates =
            calculator.footprint_dates(BookingType::Workshop, date(2026, 7, 1).at(23, 30, 0, 0));

        assert_eq!(dates, vec![date(2026, 7, 1), date(2026, 7, 2)]);
        assert_eq!(
            calculator.footprint_dates(BookingType::Sightseeing, at(23, 30)),
            vec![date(2026, 7, 1)]
        );
    }

    #[test]
    fn multi_day_reach_covers_every_date_in_between() {
        let calculator = OccupancyCalculator::new(&OccupancyConfig {
            model: OccupancyModel::IntervalOverlap,
            workshop_minutes: 3 * 24 * 60,
            ..OccupancyConfig::default()
        });

        assert_eq!(
            calculator.reaching_dates(date(2026, 7, 4).at(10, 0, 0, 0)),
            vec![
                date(2026, 7, 1),
                date(2026, 7, 2),
                date(2026, 7, 3),
                date(2026, 7, 4)
            ]
        );
        assert_eq!(
            self::calculator(OccupancyModel::ShadowSpillover).reaching_dates(at(10, 0)),
            vec![date(2026, 7, 1)]
        );
    }
}
