//! Projection of a room's display window into a viewer's timezone.
//!
//! A room shows the hours `[start_hour, end_hour)` of its own zone. Seen from
//! a zone far enough away, that range can straddle the viewer's midnight; the
//! window is then split into two segments that share one slot index space:
//!
//! - the *top* segment, indices `[0, top_slots)`, runs from the viewer's
//!   midnight up to the converted end time and belongs to the previous
//!   day key;
//! - the *bottom* segment, indices `[top_slots, total_slots)`, runs from the
//!   converted start time up to the viewer's midnight and belongs to the
//!   current day key.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::day::DayKey;
use crate::error::Result;
use crate::grid::{slot_of, DAY_SLOTS, SLOT_MINUTES};
use crate::model::{RoomWindow, TimeOfDay};
use crate::offset::{convert_clock_time_in, parse_timezone, ConvertedTime};

/// A room window as seen from one viewer's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTimeWindow {
    pub start_hour: u8,
    pub start_minute: u8,
    pub end_hour: u8,
    pub end_minute: u8,
    pub wraps: bool,
    pub top_slots: usize,
    pub bottom_slots: usize,
    pub total_slots: usize,
}

impl LocalTimeWindow {
    /// The window unchanged, for a viewer in the room's own zone.
    pub fn identity(start_hour: u8, end_hour: u8) -> Self {
        let total_slots = (end_hour as usize).saturating_sub(start_hour as usize) * 2;
        Self {
            start_hour,
            start_minute: 0,
            end_hour,
            end_minute: 0,
            wraps: false,
            top_slots: 0,
            bottom_slots: total_slots,
            total_slots,
        }
    }

    fn contiguous(start: ConvertedTime, end: ConvertedTime, total_slots: usize) -> Self {
        Self {
            start_hour: start.hour,
            start_minute: snap_minute(start.minute),
            end_hour: end.hour,
            end_minute: snap_minute(end.minute),
            wraps: false,
            top_slots: 0,
            bottom_slots: total_slots,
            total_slots,
        }
    }

    fn split(start: ConvertedTime, end: ConvertedTime, top_slots: usize, bottom_slots: usize) -> Self {
        Self {
            start_hour: start.hour,
            start_minute: snap_minute(start.minute),
            end_hour: end.hour,
            end_minute: snap_minute(end.minute),
            wraps: true,
            top_slots,
            bottom_slots,
            total_slots: top_slots + bottom_slots,
        }
    }

    /// Day slot index (from midnight) of the window's start.
    pub fn start_slot(&self) -> usize {
        self.start_hour as usize * 2 + if self.start_minute >= 30 { 1 } else { 0 }
    }

    /// Whether slot `index` lies in the top segment of a wrapping window.
    pub fn is_top(&self, index: usize) -> bool {
        self.wraps && index < self.top_slots
    }

    /// Viewer wall-clock time at which slot `index` begins.
    pub fn slot_time(&self, index: usize) -> TimeOfDay {
        let minutes = if self.is_top(index) {
            index as u32 * SLOT_MINUTES
        } else {
            let offset = if self.wraps { index - self.top_slots } else { index };
            self.start_slot() as u32 * SLOT_MINUTES + offset as u32 * SLOT_MINUTES
        };
        TimeOfDay {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }

    /// The day key slot `index` belongs to when the window is shown for `day`.
    pub fn slot_day_key(&self, index: usize, day: DayKey) -> DayKey {
        if self.is_top(index) {
            day.prev()
        } else {
            day
        }
    }

    /// `HH:MM` label for slot `index`.
    pub fn format_slot_time(&self, index: usize) -> String {
        let time = self.slot_time(index);
        format!("{:02}:{:02}", time.hour, time.minute)
    }
}

impl RoomWindow {
    /// [`project_window`] for this room.
    pub fn project(&self, viewer_tz: &str, reference_date: NaiveDate) -> Result<LocalTimeWindow> {
        project_window(
            self.start_hour,
            self.end_hour,
            &self.timezone,
            viewer_tz,
            reference_date,
        )
    }
}

/// Express the room window `[room_start_hour, room_end_hour)` of `room_tz` in
/// `viewer_tz`, as of `reference_date`.
///
/// # Errors
///
/// Returns [`crate::ScheduleError::InvalidTimezone`] if either zone is
/// unknown.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use slot_engine::window::project_window;
///
/// let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
/// let w = project_window(10, 18, "Europe/Madrid", "Asia/Tokyo", date).unwrap();
/// assert!(w.wraps);
/// assert_eq!(w.total_slots, w.top_slots + w.bottom_slots);
/// ```
pub fn project_window(
    room_start_hour: u8,
    room_end_hour: u8,
    room_tz: &str,
    viewer_tz: &str,
    reference_date: NaiveDate,
) -> Result<LocalTimeWindow> {
    let room = parse_timezone(room_tz)?;
    let viewer = parse_timezone(viewer_tz)?;
    Ok(project_window_in(
        room_start_hour,
        room_end_hour,
        room,
        viewer,
        reference_date,
    ))
}

/// [`project_window`] for already-parsed zones.
pub fn project_window_in(
    room_start_hour: u8,
    room_end_hour: u8,
    room: Tz,
    viewer: Tz,
    reference_date: NaiveDate,
) -> LocalTimeWindow {
    if room == viewer {
        return LocalTimeWindow::identity(room_start_hour, room_end_hour);
    }

    let start = convert_clock_time_in(room_start_hour, 0, reference_date, room, viewer);
    let end = convert_clock_time_in(room_end_hour, 0, reference_date, room, viewer);

    let start_slot = converted_slot(start);
    let end_slot = converted_slot(end);

    if start.day_offset == end.day_offset && start_slot < end_slot {
        return LocalTimeWindow::contiguous(start, end, (end_slot - start_slot) as usize);
    }

    // The end landed on a later viewer day but the window still fits within
    // one day counted from its start.
    let end_slot_48 = end_slot + (end.day_offset - start.day_offset) * DAY_SLOTS as i64;
    if end_slot_48 > start_slot && end_slot_48 <= DAY_SLOTS as i64 {
        return LocalTimeWindow::contiguous(start, end, (end_slot_48 - start_slot) as usize);
    }

    let top_slots = end_slot.max(0) as usize;
    let bottom_slots = (DAY_SLOTS as i64 - start_slot).max(0) as usize;
    tracing::debug!(
        room = room.name(),
        viewer = viewer.name(),
        top_slots,
        bottom_slots,
        "room window wraps viewer midnight"
    );
    LocalTimeWindow::split(start, end, top_slots, bottom_slots)
}

fn converted_slot(time: ConvertedTime) -> i64 {
    slot_of(TimeOfDay {
        hour: time.hour,
        minute: time.minute,
    }) as i64
}

fn snap_minute(minute: u8) -> u8 {
    if minute >= 30 {
        30
    } else {
        0
    }
}
