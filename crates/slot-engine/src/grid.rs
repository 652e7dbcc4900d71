//! Conversion between sparse selection lists and dense half-hour grids.
//!
//! A grid covers the hour window `[start_hour, end_hour)` of one day with one
//! `bool` per 30-minute slot. Selections that fall partly or wholly outside
//! the window are clipped without error, and overlapping selections simply
//! saturate, so [`to_grid`] is total over any input.
//!
//! The two directions are inverse on grids:
//! `to_grid(&to_selections(g, h), h, h + g.len() / 2) == g`.

use crate::model::{TimeOfDay, TimeSelection};

/// A dense availability row, one entry per 30-minute slot.
pub type Grid = Vec<bool>;

/// Length of one slot in minutes.
pub const SLOT_MINUTES: u32 = 30;

/// Number of slots in a full day.
pub const DAY_SLOTS: usize = 48;

/// Slot index of `time` counted from midnight (`hour * 2`, plus one for the
/// half hour).
pub fn slot_of(time: TimeOfDay) -> i32 {
    time.hour as i32 * 2 + if time.minute >= 30 { 1 } else { 0 }
}

/// Render `selections` as a grid over `[start_hour, end_hour)`.
///
/// # Examples
///
/// ```
/// use slot_engine::grid::to_grid;
/// use slot_engine::model::{TimeOfDay, TimeSelection};
///
/// let sel = TimeSelection::new(
///     TimeOfDay::new(10, 30).unwrap(),
///     TimeOfDay::new(11, 30).unwrap(),
/// )
/// .unwrap();
/// assert_eq!(to_grid(&[sel], 10, 12), vec![false, true, true, false]);
/// ```
pub fn to_grid(selections: &[TimeSelection], start_hour: u8, end_hour: u8) -> Grid {
    let len = (end_hour as usize).saturating_sub(start_hour as usize) * 2;
    let mut grid = vec![false; len];
    let base = start_hour as i32 * 2;

    for sel in selections {
        let from = (slot_of(sel.start) - base).max(0) as usize;
        let to = (slot_of(sel.end) - base).clamp(0, len as i32) as usize;
        if from < to {
            grid[from..to].iter_mut().for_each(|slot| *slot = true);
        }
    }

    grid
}

/// Collapse each maximal run of `true` slots into one selection.
pub fn to_selections(grid: &[bool], start_hour: u8) -> Vec<TimeSelection> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < grid.len() {
        if !grid[i] {
            i += 1;
            continue;
        }
        let from = i;
        while i < grid.len() && grid[i] {
            i += 1;
        }
        result.push(TimeSelection {
            start: slot_to_time(from, start_hour),
            end: slot_to_time(i, start_hour),
        });
    }

    result
}

/// Wall-clock time at which slot `index` of a grid based at `start_hour`
/// begins. Index `len` yields the grid's exclusive end, which may be `24:00`.
pub fn slot_to_time(index: usize, start_hour: u8) -> TimeOfDay {
    let total_minutes = start_hour as u32 * 60 + index as u32 * SLOT_MINUTES;
    TimeOfDay {
        hour: (total_minutes / 60) as u8,
        minute: (total_minutes % 60) as u8,
    }
}

/// `HH:MM` label for slot `index` of a grid based at `start_hour`.
pub fn format_slot_time(index: usize, start_hour: u8) -> String {
    let time = slot_to_time(index, start_hour);
    format!("{:02}:{:02}", time.hour, time.minute)
}
