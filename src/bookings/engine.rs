//! Slot availability engine
//!
//! Every capacity-relevant mutation of slots and bookings goes through
//! [`SlotAvailabilityEngine`]. Reads recompute occupancy from the stores on
//! every call; nothing is cached.

use std::{fmt, sync::Arc};

use jiff::{
    SignedDuration,
    civil::{Date, DateTime, Time},
};
use tracing::{debug, error, info};

use crate::{
    bookings::{
        blocks::{BlockedPeriod, GlobalBlock, GlobalBlockFilter, GlobalBlockUuid},
        errors::BookingError,
        generation,
        locks::DateLocks,
        models::{
            Booking, BookingRequest, BookingStatus, BookingType, BookingUuid, Slot,
            SlotAvailability, SlotRef, SlotUuid,
        },
        occupancy::{OccupancyCalculator, remaining},
        repository::{BookingRepository, GlobalBlockRepository, SlotRepository},
    },
    clock::Clock,
    config::EngineConfig,
    money::Price,
    notifications::{Notification, NotificationDispatcher},
};

/// The repositories the engine reads and writes.
#[derive(Clone)]
pub struct BookingStores {
    pub slots: Arc<dyn SlotRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub blocks: Arc<dyn GlobalBlockRepository>,
}

impl BookingStores {
    /// Use one store for slots, bookings and blocks.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: SlotRepository + BookingRepository + GlobalBlockRepository + 'static,
    {
        Self {
            slots: Arc::clone(&store) as Arc<dyn SlotRepository>,
            bookings: Arc::clone(&store) as Arc<dyn BookingRepository>,
            blocks: store,
        }
    }
}

impl fmt::Debug for BookingStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookingStores").finish_non_exhaustive()
    }
}

/// Slots, bookings and blocks relevant to one calendar day.
#[derive(Debug)]
struct DayView {
    /// Slots of the day, followed by slots a late booking can still reach.
    slots: Vec<Slot>,

    /// Bookings that can occupy any of `slots`.
    bookings: Vec<Booking>,

    filter: GlobalBlockFilter,
}

impl DayView {
    fn slot(&self, uuid: SlotUuid) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.uuid == uuid)
    }

    fn occupied(&self, calculator: &OccupancyCalculator, at: DateTime) -> u32 {
        calculator.occupancy(&self.bookings, at)
    }

    /// Smallest remaining capacity over every slot a booking would occupy.
    fn headroom(
        &self,
        calculator: &OccupancyCalculator,
        kind: BookingType,
        start: DateTime,
    ) -> u32 {
        self.slots
            .iter()
            .filter(|slot| calculator.covers(kind, start, slot.starts_at))
            .map(|slot| remaining(slot.capacity, self.occupied(calculator, slot.starts_at)))
            .min()
            .unwrap_or(0)
    }
}

/// Decides which start times are bookable and books them.
pub struct SlotAvailabilityEngine {
    config: Arc<EngineConfig>,
    stores: BookingStores,
    clock: Arc<dyn Clock>,
    calculator: OccupancyCalculator,
    notifications: NotificationDispatcher,
    locks: DateLocks,
}

impl fmt::Debug for SlotAvailabilityEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotAvailabilityEngine")
            .field("calculator", &self.calculator)
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}

impl SlotAvailabilityEngine {
    /// Create an engine over the given stores.
    #[must_use]
    pub fn new(config: Arc<EngineConfig>, stores: BookingStores, clock: Arc<dyn Clock>) -> Self {
        Self {
            calculator: OccupancyCalculator::new(&config.occupancy),
            config,
            stores,
            clock,
            notifications: NotificationDispatcher::new(),
            locks: DateLocks::new(),
        }
    }

    /// Dispatch booking notifications through `notifications`.
    #[must_use]
    pub fn with_notifications(mut self, notifications: NotificationDispatcher) -> Self {
        self.notifications = notifications;
        self
    }

    /// The occupancy calculator in use.
    #[must_use]
    pub const fn calculator(&self) -> &OccupancyCalculator {
        &self.calculator
    }

    /// Start times on `date` that can take `party_size` more people of `kind`,
    /// ascending. Only slots starting at or after now are considered.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidPartySize`] for a zero party size, or a
    /// storage error.
    #[tracing::instrument(name = "bookings.list_bookable_start_times", skip(self))]
    pub async fn list_bookable_start_times(
        &self,
        date: Date,
        kind: BookingType,
        party_size: u32,
    ) -> Result<Vec<DateTime>, BookingError> {
        if party_size == 0 {
            return logged(Err(BookingError::InvalidPartySize));
        }

        let view = self.load_view(date).await?;
        let now = self.clock.now();

        let times = view
            .slots
            .iter()
            .filter(|slot| slot.starts_at.date() == date && slot.starts_at >= now)
            .filter(|slot| view.filter.check_slot(slot).is_none())
            .filter(|slot| view.headroom(&self.calculator, kind, slot.starts_at) >= party_size)
            .map(|slot| slot.starts_at)
            .collect();

        Ok(times)
    }

    /// Every slot on `date` with its occupancy and block status, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the stores fail.
    #[tracing::instrument(name = "bookings.slot_overview", skip(self), err)]
    pub async fn slot_overview(&self, date: Date) -> Result<Vec<SlotAvailability>, BookingError> {
        let view = self.load_view(date).await?;

        Ok(view
            .slots
            .iter()
            .filter(|slot| slot.starts_at.date() == date)
            .map(|slot| {
                let occupied = view.occupied(&self.calculator, slot.starts_at);

                SlotAvailability {
                    slot: slot.clone(),
                    occupied,
                    remaining: remaining(slot.capacity, occupied),
                    blocked_by: view.filter.check_slot(slot),
                }
            })
            .collect())
    }

    /// Book `request.party_size` people into a slot.
    ///
    /// The capacity check and the insert run under the locks of every date
    /// the booking can occupy, so concurrent requests cannot overbook.
    ///
    /// # Errors
    ///
    /// Rejects zero party sizes, unknown, past or blocked slots, and requests
    /// that do not fit in every slot the booking would occupy.
    #[tracing::instrument(
        name = "bookings.confirm_booking",
        skip(self, request),
        fields(slot = ?request.slot, kind = ?request.kind, party_size = request.party_size)
    )]
    pub async fn confirm_booking(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        logged(self.try_confirm_booking(request).await)
    }

    async fn try_confirm_booking(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        let BookingRequest {
            slot,
            kind,
            party_size,
            customer,
            notes,
        } = request;

        if party_size == 0 {
            return Err(BookingError::InvalidPartySize);
        }

        let slot = self.resolve_slot(slot).await?;

        if slot.starts_at < self.clock.now() {
            return Err(BookingError::SlotInPast);
        }

        let guards = self
            .locks
            .lock(self.calculator.footprint_dates(kind, slot.starts_at))
            .await;

        let view = self.load_view(slot.starts_at.date()).await?;

        let slot = view
            .slot(slot.uuid)
            .cloned()
            .ok_or(BookingError::SlotNotFound)?;

        if let Some(block) = view.filter.check_slot(&slot) {
            return Err(BookingError::SlotBlocked(block));
        }

        let headroom = view.headroom(&self.calculator, kind, slot.starts_at);

        if headroom < party_size {
            return Err(BookingError::InsufficientCapacity {
                remaining: headroom,
                requested: party_size,
            });
        }

        let unit_price = self.unit_price(&slot, kind)?;

        let booking = self
            .stores
            .bookings
            .create_booking(Booking {
                uuid: BookingUuid::new(),
                slot: Some(slot.uuid),
                starts_at: slot.starts_at,
                kind,
                party_size,
                status: BookingStatus::Confirmed,
                unit_price,
                customer,
                notes,
                reminder_sent_at: None,
                created_at: self.clock.timestamp(),
            })
            .await?;

        drop(guards);

        info!(booking = %booking.uuid, starts_at = %booking.starts_at, "booking confirmed");

        self.notifications.dispatch(Notification::BookingConfirmed {
            booking: booking.uuid,
            starts_at: booking.starts_at,
            kind: booking.kind,
            party_size: booking.party_size,
            email: booking.customer.email.clone(),
        });

        Ok(booking)
    }

    /// Create every slot of a calendar month within business hours. Start
    /// times that already have a slot are left alone. Returns how many slots
    /// were created.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid month or a storage failure.
    #[tracing::instrument(name = "bookings.generate_month", skip(self), err)]
    pub async fn generate_month(&self, year: i16, month: i8) -> Result<usize, BookingError> {
        let slots = generation::month_slots(year, month, &self.config.venue)?
            .into_iter()
            .map(Slot::from)
            .collect();

        let created = self.stores.slots.create_slots(slots).await?;

        info!(created, "generated slots");

        Ok(created)
    }

    /// Cancel a booking, releasing its capacity. Cancelling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BookingNotFound`] for unknown bookings.
    #[tracing::instrument(name = "bookings.cancel_booking", skip(self), fields(booking = %uuid))]
    pub async fn cancel_booking(&self, uuid: BookingUuid) -> Result<Booking, BookingError> {
        logged(
            self.update_booking(uuid, |booking| {
                booking.status = BookingStatus::Cancelled;
            })
            .await,
        )
    }

    /// Replace a booking's staff notes.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BookingNotFound`] for unknown bookings.
    #[tracing::instrument(
        name = "bookings.set_booking_notes",
        skip(self, notes),
        fields(booking = %uuid)
    )]
    pub async fn set_booking_notes(
        &self,
        uuid: BookingUuid,
        notes: Option<String>,
    ) -> Result<Booking, BookingError> {
        logged(
            self.update_booking(uuid, move |booking| {
                booking.notes = notes;
            })
            .await,
        )
    }

    /// Bookings that start within `within` from now, are not cancelled and
    /// have not been reminded yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the window overflows or the stores fail.
    #[tracing::instrument(name = "bookings.due_reminders", skip(self), err)]
    pub async fn due_reminders(
        &self,
        within: SignedDuration,
    ) -> Result<Vec<Booking>, BookingError> {
        let now = self.clock.now();
        let until = now.checked_add(within)?;

        let bookings = self.stores.bookings.list_bookings(now, until).await?;

        Ok(bookings
            .into_iter()
            .filter(|booking| booking.occupies() && booking.reminder_sent_at.is_none())
            .collect())
    }

    /// Record that a reminder was sent for a booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BookingNotFound`] for unknown bookings.
    #[tracing::instrument(
        name = "bookings.mark_reminder_sent",
        skip(self),
        fields(booking = %uuid)
    )]
    pub async fn mark_reminder_sent(&self, uuid: BookingUuid) -> Result<Booking, BookingError> {
        let sent_at = self.clock.timestamp();

        logged(
            self.update_booking(uuid, move |booking| {
                booking.reminder_sent_at = Some(sent_at);
            })
            .await,
        )
    }

    /// Change a slot's capacity. Lowering it below current occupancy is
    /// allowed; the slot then reports zero remaining.
    ///
    /// # Errors
    ///
    /// Rejects a zero capacity and unknown slots.
    #[tracing::instrument(
        name = "bookings.override_slot_capacity",
        skip(self),
        fields(slot = %uuid)
    )]
    pub async fn override_slot_capacity(
        &self,
        uuid: SlotUuid,
        capacity: u32,
    ) -> Result<Slot, BookingError> {
        if capacity == 0 {
            return logged(Err(BookingError::InvalidCapacity));
        }

        logged(
            self.update_slot(uuid, |slot| {
                slot.capacity = capacity;
            })
            .await,
        )
    }

    /// Set or clear a slot's per-person price override.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] for unknown slots.
    #[tracing::instrument(name = "bookings.override_slot_price", skip(self), fields(slot = %uuid))]
    pub async fn override_slot_price(
        &self,
        uuid: SlotUuid,
        price: Option<Price>,
    ) -> Result<Slot, BookingError> {
        logged(
            self.update_slot(uuid, |slot| {
                slot.price_override = price;
            })
            .await,
        )
    }

    /// Close or reopen a single slot.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] for unknown slots.
    #[tracing::instrument(name = "bookings.set_slot_blocked", skip(self), fields(slot = %uuid))]
    pub async fn set_slot_blocked(
        &self,
        uuid: SlotUuid,
        blocked: bool,
    ) -> Result<Slot, BookingError> {
        logged(
            self.update_slot(uuid, |slot| {
                slot.is_blocked = blocked;
            })
            .await,
        )
    }

    /// Black out a date or month. If a block for the same period exists it is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the stores fail.
    #[tracing::instrument(name = "bookings.add_global_block", skip(self, reason), err)]
    pub async fn add_global_block(
        &self,
        period: BlockedPeriod,
        reason: Option<String>,
    ) -> Result<GlobalBlock, BookingError> {
        let existing = self.stores.blocks.list_blocks().await?;

        if let Some(block) = existing.into_iter().find(|block| block.period == period) {
            debug!(block = %block.uuid, "period already blocked");

            return Ok(block);
        }

        let block = self
            .stores
            .blocks
            .create_block(GlobalBlock {
                uuid: GlobalBlockUuid::new(),
                period,
                reason,
            })
            .await?;

        info!(block = %block.uuid, "global block added");

        Ok(block)
    }

    /// Lift a global block.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BlockNotFound`] for unknown blocks.
    #[tracing::instrument(name = "bookings.remove_global_block", skip(self), fields(block = %uuid))]
    pub async fn remove_global_block(&self, uuid: GlobalBlockUuid) -> Result<(), BookingError> {
        let result = self
            .stores
            .blocks
            .delete_block(uuid)
            .await
            .map_err(|err| BookingError::not_found_as(err, BookingError::BlockNotFound));

        logged(result)
    }

    async fn resolve_slot(&self, slot: SlotRef) -> Result<Slot, BookingError> {
        match slot {
            SlotRef::Id(uuid) => self
                .stores
                .slots
                .get_slot(uuid)
                .await
                .map_err(|err| BookingError::not_found_as(err, BookingError::SlotNotFound)),
            SlotRef::StartsAt(starts_at) => self
                .stores
                .slots
                .find_slot_at(starts_at)
                .await?
                .ok_or(BookingError::SlotNotFound),
        }
    }

    fn unit_price(&self, slot: &Slot, kind: BookingType) -> Result<Price, BookingError> {
        match slot.price_override {
            Some(price) => Ok(price),
            None => Ok(self.config.ticket_price(kind)?),
        }
    }

    async fn load_view(&self, date: Date) -> Result<DayView, BookingError> {
        let reach = self.calculator.max_reach();
        let day_start = date.to_datetime(Time::midnight());
        let day_end = date.tomorrow()?.to_datetime(Time::midnight());

        let window_start = day_start.checked_sub(reach).unwrap_or(day_start);
        let window_end = day_end.checked_add(reach).unwrap_or(day_end);

        let slots = self.stores.slots.list_slots(day_start, window_end).await?;
        let bookings = self
            .stores
            .bookings
            .list_bookings(window_start, window_end)
            .await?;
        let blocks = self.stores.blocks.list_blocks().await?;

        Ok(DayView {
            slots,
            bookings,
            filter: GlobalBlockFilter::new(&blocks),
        })
    }

    async fn update_booking(
        &self,
        uuid: BookingUuid,
        change: impl FnOnce(&mut Booking) + Send,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking(uuid).await?;

        let _guards = self
            .locks
            .lock(self.calculator.footprint_dates(booking.kind, booking.starts_at))
            .await;

        let mut booking = self.get_booking(uuid).await?;

        change(&mut booking);

        Ok(self.stores.bookings.update_booking(booking).await?)
    }

    async fn get_booking(&self, uuid: BookingUuid) -> Result<Booking, BookingError> {
        self.stores
            .bookings
            .get_booking(uuid)
            .await
            .map_err(|err| BookingError::not_found_as(err, BookingError::BookingNotFound))
    }

    async fn update_slot(
        &self,
        uuid: SlotUuid,
        change: impl FnOnce(&mut Slot) + Send,
    ) -> Result<Slot, BookingError> {
        let slot = self.resolve_slot(SlotRef::Id(uuid)).await?;

        let _guards = self
            .locks
            .lock(self.calculator.reaching_dates(slot.starts_at))
            .await;

        let mut slot = self.resolve_slot(SlotRef::Id(uuid)).await?;

        change(&mut slot);

        Ok(self.stores.slots.update_slot(slot).await?)
    }
}

/// Log a result the way the error taxonomy asks: caller mistakes at debug,
/// system failures at error.
fn logged<T>(result: Result<T, BookingError>) -> Result<T, BookingError> {
    if let Err(err) = &result {
        if err.is_rejection() {
            debug!(code = err.code(), error = %err, "booking request rejected");
        } else {
            error!(code = err.code(), error = %err, "booking operation failed");
        }
    }

    result
}
