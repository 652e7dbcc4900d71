use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use slot_engine::offset::{format_utc_offset, is_dst_active, parse_timezone};
use slot_engine::{
    convert_clock_time, offset_ms, parse_date_key, project_local_grid_to_user,
    project_user_day_to_local, time_range, DayKey, LocalTimeWindow, RoomWindow, TimeOfDay,
    UserSchedule, WeeklyAvailability,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slots", version)]
#[command(about = "Half-hour availability grids across timezones")]
struct Cli {
    /// Log level for engine diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a zone's UTC offset at an instant
    Offset {
        /// IANA timezone (e.g., "America/New_York")
        #[arg(long)]
        tz: String,

        /// Instant as RFC 3339 (e.g., "2025-01-15T12:00:00Z")
        #[arg(long)]
        at: String,
    },
    /// Convert a wall-clock time from one zone to another
    Convert {
        /// Time as HH:MM on the half hour
        #[arg(long)]
        time: String,

        /// Reference date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_key)]
        date: NaiveDate,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,
    },
    /// Show a room's display window in the viewer's zone
    Window {
        /// Room JSON file ({"startHour", "endHour", "timezone"}), or - for stdin
        #[arg(long)]
        room: PathBuf,

        #[arg(long)]
        viewer_tz: String,

        #[arg(long, value_parser = parse_date_key)]
        date: NaiveDate,
    },
    /// Project a user's availability for a date onto the viewer's window
    Project {
        #[arg(long)]
        room: PathBuf,

        /// User JSON file ({"timezone", "weeklyAvailability", "overrides"}), or - for stdin
        #[arg(long)]
        user: PathBuf,

        #[arg(long)]
        viewer_tz: String,

        #[arg(long, value_parser = parse_date_key)]
        date: NaiveDate,

        /// Print one line per slot instead of JSON
        #[arg(long)]
        text: bool,
    },
    /// Map an edited viewer grid back to the user's weekdays
    Store {
        #[arg(long)]
        room: PathBuf,

        #[arg(long)]
        viewer_tz: String,

        #[arg(long)]
        user_tz: String,

        #[arg(long, value_parser = parse_date_key)]
        date: NaiveDate,

        /// One character per window slot: 1 = available, 0 = not
        #[arg(long)]
        grid: String,
    },
    /// Derive a room's display hours from its default weekly availability
    Range {
        /// Weekly availability JSON file, or - for stdin
        #[arg(long)]
        week: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OffsetReport {
    timezone: String,
    offset_ms: i64,
    utc_offset: String,
    dst_active: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectReport {
    day_key: DayKey,
    window: LocalTimeWindow,
    grid: Vec<bool>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Offset { tz, at } => cmd_offset(&tz, &at),
        Commands::Convert {
            time,
            date,
            from,
            to,
        } => cmd_convert(&time, date, &from, &to),
        Commands::Window {
            room,
            viewer_tz,
            date,
        } => cmd_window(&room, &viewer_tz, date),
        Commands::Project {
            room,
            user,
            viewer_tz,
            date,
            text,
        } => cmd_project(&room, &user, &viewer_tz, date, text),
        Commands::Store {
            room,
            viewer_tz,
            user_tz,
            date,
            grid,
        } => cmd_store(&room, &viewer_tz, &user_tz, date, &grid),
        Commands::Range { week } => cmd_range(&week),
    }
}

/// Engine diagnostics go to stderr so stdout stays machine-readable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("slot_engine={0},slots={0},warn", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_offset(tz: &str, at: &str) -> Result<()> {
    let instant = DateTime::parse_from_rfc3339(at)
        .with_context(|| format!("invalid RFC 3339 instant '{}'", at))?
        .with_timezone(&Utc);
    let offset = offset_ms(instant, tz)?;
    let report = OffsetReport {
        timezone: tz.to_string(),
        offset_ms: offset,
        utc_offset: format_utc_offset(offset),
        dst_active: is_dst_active(instant, parse_timezone(tz)?),
    };
    print_json(&report)
}

fn cmd_convert(time: &str, date: NaiveDate, from: &str, to: &str) -> Result<()> {
    let time = parse_time(time)?;
    let converted = convert_clock_time(time.hour, time.minute, date, from, to)?;
    print_json(&converted)
}

fn cmd_window(room: &Path, viewer_tz: &str, date: NaiveDate) -> Result<()> {
    let room = load_room(room)?;
    let window = room.project(viewer_tz, date)?;
    print_json(&window)
}

fn cmd_project(
    room: &Path,
    user: &Path,
    viewer_tz: &str,
    date: NaiveDate,
    text: bool,
) -> Result<()> {
    let room = load_room(room)?;
    let user: UserSchedule = read_json(user)?;
    user.validate().context("invalid user schedule")?;

    let day_key = DayKey::from_date(date);
    let window = room.project(viewer_tz, date)?;
    let grid = project_user_day_to_local(&user, viewer_tz, date, day_key, &window)?;

    if !text {
        return print_json(&ProjectReport {
            day_key,
            window,
            grid,
        });
    }

    for (index, available) in grid.iter().enumerate() {
        println!(
            "{:<9} {}  {}",
            window.slot_day_key(index, day_key),
            window.format_slot_time(index),
            if *available { '#' } else { '.' }
        );
    }
    Ok(())
}

fn cmd_store(
    room: &Path,
    viewer_tz: &str,
    user_tz: &str,
    date: NaiveDate,
    grid: &str,
) -> Result<()> {
    let room = load_room(room)?;
    let window = room.project(viewer_tz, date)?;
    let grid = parse_grid(grid)?;
    if grid.len() != window.total_slots {
        bail!(
            "grid has {} slots but the window in {} has {}",
            grid.len(),
            viewer_tz,
            window.total_slots
        );
    }

    let days = project_local_grid_to_user(
        &grid,
        &window,
        date,
        DayKey::from_date(date),
        viewer_tz,
        user_tz,
    )?;
    print_json(&days)
}

fn cmd_range(week: &Path) -> Result<()> {
    let week: WeeklyAvailability = read_json(week)?;
    week.validate().context("invalid weekly availability")?;
    print_json(&time_range(&week))
}

// ── Input helpers ───────────────────────────────────────────────────────────

fn load_room(path: &Path) -> Result<RoomWindow> {
    let room: RoomWindow = read_json(path)?;
    room.validate().context("invalid room window")?;
    tracing::debug!(
        start_hour = room.start_hour,
        end_hour = room.end_hour,
        timezone = %room.timezone,
        "loaded room"
    );
    Ok(room)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn parse_time(s: &str) -> Result<TimeOfDay> {
    let (hour, minute) = s
        .split_once(':')
        .with_context(|| format!("expected HH:MM, got '{}'", s))?;
    let hour: u8 = hour.parse().with_context(|| format!("invalid hour in '{}'", s))?;
    let minute: u8 = minute
        .parse()
        .with_context(|| format!("invalid minute in '{}'", s))?;
    Ok(TimeOfDay::new(hour, minute)?)
}

fn parse_grid(s: &str) -> Result<Vec<bool>> {
    s.chars()
        .map(|c| match c {
            '1' => Ok(true),
            '0' => Ok(false),
            other => bail!("grid may only contain 0 and 1, found '{}'", other),
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
