//! # slot-engine
//!
//! Half-hour availability grids and their projection across timezones.
//!
//! People store recurring weekly availability in their own zone, plus
//! date-specific block/unblock overrides. The engine turns those interval
//! lists into dense 30-minute grids, resolves overrides, and re-projects any
//! person's day onto a viewer's zone and a room's shared display window,
//! including windows that straddle the viewer's midnight. Edited viewer grids
//! are mapped back to owner-zone selections for persistence.
//!
//! Every function is pure: no clock access, no I/O, no shared state. The
//! caller supplies the reference date.
//!
//! ## Modules
//!
//! - [`grid`] — Selection lists ↔ dense half-hour grids
//! - [`overrides`] — Date-keyed block/unblock resolution
//! - [`offset`] — DST-aware UTC offsets and wall-clock conversion
//! - [`window`] — Room display window as seen from a viewer's zone
//! - [`projector`] — One person's day onto a viewer window, and back
//! - [`day`] — Circular weekday keys and date helpers
//! - [`model`] — Availability data model and boundary validation
//! - [`error`] — Error types

pub mod day;
pub mod error;
pub mod grid;
pub mod model;
pub mod offset;
pub mod overrides;
pub mod projector;
pub mod window;

pub use day::{format_date_key, monday_of_week, parse_date_key, DayKey};
pub use error::ScheduleError;
pub use grid::{format_slot_time, to_grid, to_selections, Grid};
pub use model::{
    time_range, DisplayRange, Override, OverrideKind, RoomWindow, TimeOfDay, TimeSelection,
    UserSchedule, WeeklyAvailability,
};
pub use offset::{convert_clock_time, offset_ms, ConvertedTime, OffsetCache};
pub use overrides::apply_overrides;
pub use projector::{project_local_grid_to_user, project_user_day_to_local, DaySelections};
pub use window::{project_window, LocalTimeWindow};
