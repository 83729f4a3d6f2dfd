//! Human-readable track duration formatting
//!
//! Provides the clock-style display used in queue listings, search offers
//! and now-playing views.

/// Placeholder shown for tracks whose length is unknown (direct links,
/// uploads and live streams report a zero duration)
pub const UNKNOWN_DURATION: &str = "--:--";

const SECONDS_PER_HOUR: u64 = 3600;

/// Format a track length as `M:SS`, or `H:MM:SS` from one hour upwards.
///
/// A zero length means the backend did not report one.
///
/// # Examples
///
/// ```
/// use encore_common::human_time::format_track_duration;
///
/// assert_eq!(format_track_duration(0), "--:--");
/// assert_eq!(format_track_duration(5), "0:05");
/// assert_eq!(format_track_duration(213), "3:33");
/// assert_eq!(format_track_duration(3725), "1:02:05");
/// ```
pub fn format_track_duration(seconds: u64) -> String {
    if seconds == 0 {
        return UNKNOWN_DURATION.to_string();
    }

    let hours = seconds / SECONDS_PER_HOUR;
    let minutes = (seconds % SECONDS_PER_HOUR) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Sum of track lengths, formatted like a single track.
///
/// Tracks with unknown length contribute nothing; an all-unknown list
/// formats as [`UNKNOWN_DURATION`].
pub fn format_total_duration<I>(durations: I) -> String
where
    I: IntoIterator<Item = u64>,
{
    format_track_duration(durations.into_iter().sum())
}
