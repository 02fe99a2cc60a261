//! Slot generation

use jiff::{SignedDuration, civil::Date};

use crate::{bookings::models::NewSlot, config::VenueConfig};

/// One slot per interval within business hours, for every day of the month.
///
/// Slots start at the opening time (inclusive) and stop before closing time.
///
/// # Errors
///
/// Returns an error if `year`/`month` is not a valid calendar month.
pub fn month_slots(year: i16, month: i8, venue: &VenueConfig) -> Result<Vec<NewSlot>, jiff::Error> {
    let first = Date::new(year, month, 1)?;
    let step = SignedDuration::from_mins(i64::from(venue.slot_interval_minutes.max(1)));

    let mut slots = Vec::new();
    let mut day = first;

    while day.month() == month && day.year() == year {
        let mut starts_at = day.to_datetime(venue.business_hours.open);
        let closes_at = day.to_datetime(venue.business_hours.close);

        while starts_at < closes_at {
            slots.push(NewSlot {
                starts_at,
                capacity: venue.default_capacity,
            });

            starts_at = starts_at.checked_add(step)?;
        }

        day = match day.tomorrow() {
            Ok(next) => next,
            Err(_) => break,
        };
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use jiff::civil::{Time, date};
    use testresult::TestResult;

    use crate::config::BusinessHours;

    use super::*;

    #[test]
    fn default_hours_produce_32_slots_per_day() -> TestResult {
        let venue = VenueConfig::default();

        let slots = month_slots(2026, 2, &venue)?;

        assert_eq!(slots.len(), 28 * 32);
        assert_eq!(
            slots.first().map(|slot| slot.starts_at),
            Some(date(2026, 2, 1).at(10, 0, 0, 0))
        );
        assert_eq!(
            slots.last().map(|slot| slot.starts_at),
            Some(date(2026, 2, 28).at(17, 45, 0, 0))
        );
        assert!(slots.iter().all(|slot| slot.capacity == 92), "default capacity applies");

        Ok(())
    }

    #[test]
    fn interval_that_does_not_divide_hours_stops_before_close() -> TestResult {
        let venue = VenueConfig {
            business_hours: BusinessHours {
                open: Time::constant(9, 0, 0, 0),
                close: Time::constant(10, 0, 0, 0),
            },
            slot_interval_minutes: 25,
            ..VenueConfig::default()
        };

        let slots = month_slots(2026, 4, &venue)?;
        let first_day: Vec<_> = slots
            .iter()
            .filter(|slot| slot.starts_at.date() == date(2026, 4, 1))
            .map(|slot| slot.starts_at.time())
            .collect();

        assert_eq!(
            first_day,
            vec![
                Time::constant(9, 0, 0, 0),
                Time::constant(9, 25, 0, 0),
                Time::constant(9, 50, 0, 0)
            ]
        );

        Ok(())
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(month_slots(2026, 13, &VenueConfig::default()).is_err());
    }
}
