use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};

const ID_LEN: usize = 8;

pub const POMODORO_FOCUS_MINUTES: u32 = 25;
pub const POMODORO_SHORT_BREAK_MINUTES: u32 = 5;
pub const POMODORO_LONG_BREAK_MINUTES: u32 = 15;
pub const POMODORO_ROUNDS: u32 = 4;

pub const WORK_DAY_FOCUS_MINUTES: u32 = 50;
pub const WORK_DAY_SHORT_BREAK_MINUTES: u32 = 10;
pub const WORK_DAY_LONG_BREAK_MINUTES: u32 = 60;
pub const WORK_DAY_ROUNDS: u32 = 8;

const STREAK_LOOKBACK_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionType {
    Pomodoro,
    DeepWork,
    WorkDay,
    Custom,
}

impl SessionType {
    /// Pomodoro-style sessions cycle through phases; the rest count down once.
    pub fn is_multi_phase(self) -> bool {
        matches!(self, SessionType::Pomodoro | SessionType::WorkDay)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "pomodoro" => Ok(SessionType::Pomodoro),
            "deep-work" => Ok(SessionType::DeepWork),
            "work-day" => Ok(SessionType::WorkDay),
            "custom" => Ok(SessionType::Custom),
            other => Err(format!(
                "unknown session type '{other}', expected pomodoro, deep-work, work-day or custom"
            )),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionType::Pomodoro => "Pomodoro",
            SessionType::DeepWork => "Deep Work",
            SessionType::WorkDay => "Work Day",
            SessionType::Custom => "Custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PomodoroPhase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl PomodoroPhase {
    pub fn label(self) -> &'static str {
        match self {
            PomodoroPhase::Focus => "Focus Time",
            PomodoroPhase::ShortBreak => "Short Break",
            PomodoroPhase::LongBreak => "Long Break",
        }
    }
}

/// Phase durations handed to `FocusSession::create` for `pomodoro` sessions.
/// `work-day` sessions always use the fixed work-day preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PomodoroConfig {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub rounds: u32,
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            focus_minutes: POMODORO_FOCUS_MINUTES,
            short_break_minutes: POMODORO_SHORT_BREAK_MINUTES,
            long_break_minutes: POMODORO_LONG_BREAK_MINUTES,
            rounds: POMODORO_ROUNDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroState {
    pub pomodoro_phase: PomodoroPhase,
    pub pomodoro_round: u32,
    pub total_pomodoro_rounds: u32,
    pub focus_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
}

impl PomodoroState {
    pub fn phase_minutes(&self, phase: PomodoroPhase) -> u32 {
        match phase {
            PomodoroPhase::Focus => self.focus_duration,
            PomodoroPhase::ShortBreak => self.short_break_duration,
            PomodoroPhase::LongBreak => self.long_break_duration,
        }
    }

    pub fn current_phase_minutes(&self) -> u32 {
        self.phase_minutes(self.pomodoro_phase)
    }
}

/// Outcome of completing the current Pomodoro phase. `recorded_focus_minutes`
/// carries the focus time the caller must credit to today's calendar bucket;
/// breaks never record anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Transition {
        phase: PomodoroPhase,
        round: u32,
        minutes: u32,
        recorded_focus_minutes: Option<u32>,
    },
    Complete,
}

/// Pure phase-transition function: focus flows into a short break (or the
/// long break after the final round), breaks flow back into focus, and the
/// long break ends the whole session.
pub fn advance_phase(state: &PomodoroState) -> PhaseOutcome {
    match state.pomodoro_phase {
        PomodoroPhase::Focus => {
            let (phase, minutes) = if state.pomodoro_round >= state.total_pomodoro_rounds {
                (PomodoroPhase::LongBreak, state.long_break_duration)
            } else {
                (PomodoroPhase::ShortBreak, state.short_break_duration)
            };
            PhaseOutcome::Transition {
                phase,
                round: state.pomodoro_round,
                minutes,
                recorded_focus_minutes: Some(state.focus_duration),
            }
        }
        PomodoroPhase::ShortBreak => PhaseOutcome::Transition {
            phase: PomodoroPhase::Focus,
            round: state.pomodoro_round + 1,
            minutes: state.focus_duration,
            recorded_focus_minutes: None,
        },
        PomodoroPhase::LongBreak => PhaseOutcome::Complete,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: String,
    pub task: String,
    /// Planned minutes; for Pomodoro-style sessions, the current phase length.
    pub duration: u32,
    /// Milliseconds since epoch.
    pub start_time: i64,
    pub end_time: i64,
    /// Seconds left in the current phase; the authoritative countdown value.
    pub time_remaining: u32,
    pub is_active: bool,
    pub is_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    pub session_type: SessionType,
    #[serde(flatten)]
    pub pomodoro: Option<PomodoroState>,
}

impl FocusSession {
    pub fn create(
        task: impl Into<String>,
        duration_minutes: u32,
        youtube_url: Option<String>,
        session_type: SessionType,
        config: Option<PomodoroConfig>,
        now: DateTime<Utc>,
    ) -> Self {
        let pomodoro = match session_type {
            SessionType::Pomodoro => {
                let config = config.unwrap_or_default();
                Some(PomodoroState {
                    pomodoro_phase: PomodoroPhase::Focus,
                    pomodoro_round: 1,
                    total_pomodoro_rounds: config.rounds,
                    focus_duration: config.focus_minutes,
                    short_break_duration: config.short_break_minutes,
                    long_break_duration: config.long_break_minutes,
                })
            }
            SessionType::WorkDay => Some(PomodoroState {
                pomodoro_phase: PomodoroPhase::Focus,
                pomodoro_round: 1,
                total_pomodoro_rounds: WORK_DAY_ROUNDS,
                focus_duration: WORK_DAY_FOCUS_MINUTES,
                short_break_duration: WORK_DAY_SHORT_BREAK_MINUTES,
                long_break_duration: WORK_DAY_LONG_BREAK_MINUTES,
            }),
            SessionType::DeepWork | SessionType::Custom => None,
        };

        // Multi-phase sessions always open with a full focus phase.
        let duration = pomodoro
            .as_ref()
            .map(|state| state.focus_duration)
            .unwrap_or(duration_minutes);
        let start_time = now.timestamp_millis();

        Self {
            id: generate_id(),
            task: task.into(),
            duration,
            start_time,
            end_time: start_time + i64::from(duration) * 60_000,
            time_remaining: duration * 60,
            is_active: true,
            is_paused: false,
            youtube_url,
            session_type,
            pomodoro,
        }
    }

    /// A stored session may be resumed only while it is active and its
    /// deadline has not passed.
    pub fn is_resumable(&self, now_millis: i64) -> bool {
        self.is_active && now_millis < self.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    Code,
    Study,
    Design,
}

impl TaskKind {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.to_ascii_lowercase().as_str() {
            "code" => Ok(TaskKind::Code),
            "study" => Ok(TaskKind::Study),
            "design" => Ok(TaskKind::Design),
            other => Err(format!(
                "unknown task kind '{other}', expected code, study or design"
            )),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskKind::Code => "Code",
            TaskKind::Study => "Study",
            TaskKind::Design => "Design",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>, kind: TaskKind, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            title: title.into(),
            kind,
            status: TaskStatus::Todo,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn toggle(&mut self, now: DateTime<Utc>) {
        match self.status {
            TaskStatus::Todo => {
                self.status = TaskStatus::Done;
                self.completed_at = Some(now);
            }
            TaskStatus::Done => {
                self.status = TaskStatus::Todo;
                self.completed_at = None;
            }
        }
    }
}

/// Accumulated focus-hours per calendar day, keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Calendar {
    days: BTreeMap<String, f64>,
}

impl Calendar {
    pub fn record(&mut self, date: NaiveDate, hours: f64) {
        if hours <= 0.0 {
            return;
        }
        *self.days.entry(date_key(date)).or_insert(0.0) += hours;
    }

    pub fn hours_on(&self, date: NaiveDate) -> f64 {
        self.days.get(&date_key(date)).copied().unwrap_or(0.0)
    }

    /// Consecutive days with recorded focus time, counting backward from
    /// `today` (inclusive), bounded to one year.
    pub fn streak(&self, today: NaiveDate) -> u32 {
        let mut consecutive = 0;
        for offset in 0..STREAK_LOOKBACK_DAYS {
            if self.hours_on(today - Duration::days(offset)) > 0.0 {
                consecutive += 1;
            } else {
                break;
            }
        }
        consecutive
    }

    pub fn total_hours(&self) -> f64 {
        self.days.values().sum()
    }

    pub fn active_days(&self) -> usize {
        self.days.values().filter(|hours| **hours > 0.0).count()
    }
}

/// Visual intensity bucket for a day's focus hours.
pub fn calendar_level(hours: f64) -> u8 {
    if hours <= 0.0 {
        0
    } else if hours < 1.0 {
        1
    } else if hours < 2.0 {
        2
    } else if hours < 4.0 {
        3
    } else {
        4
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Extracts the video id from `youtube.com/watch?v=<id>` or `youtu.be/<id>`.
/// Anything else means "no video", never an error.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let rest = url
        .split_once("youtube.com/watch?v=")
        .map(|(_, rest)| rest)
        .or_else(|| url.split_once("youtu.be/").map(|(_, rest)| rest))?;

    let id: String = rest
        .chars()
        .take_while(|value| !matches!(value, '&' | '?' | '#' | '\n'))
        .collect();
    if id.is_empty() { None } else { Some(id) }
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// `MM:SS`, or `HH:MM:SS` once an hour or more remains.
pub fn format_clock(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    fn sample_pomodoro_state(round: u32, phase: PomodoroPhase) -> PomodoroState {
        PomodoroState {
            pomodoro_phase: phase,
            pomodoro_round: round,
            total_pomodoro_rounds: 4,
            focus_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
        }
    }

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn create_session_derives_countdown_from_duration() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        for minutes in [1, 25, 90, 180] {
            let session =
                FocusSession::create("write tests", minutes, None, SessionType::Custom, None, now);
            assert_eq!(session.time_remaining, minutes * 60);
            assert_eq!(
                session.end_time - session.start_time,
                i64::from(minutes) * 60_000
            );
            assert!(session.is_active);
            assert!(!session.is_paused);
            assert!(session.pomodoro.is_none());
        }
    }

    #[test]
    fn pomodoro_session_opens_with_focus_round_one() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let session =
            FocusSession::create("ship the parser", 30, None, SessionType::Pomodoro, None, now);
        let state = session.pomodoro.as_ref().expect("pomodoro state");
        assert_eq!(state.pomodoro_phase, PomodoroPhase::Focus);
        assert_eq!(state.pomodoro_round, 1);
        assert_eq!(state.total_pomodoro_rounds, POMODORO_ROUNDS);
        // The countdown always opens on the focus phase, not the raw minutes.
        assert_eq!(session.duration, POMODORO_FOCUS_MINUTES);
        assert_eq!(session.time_remaining, POMODORO_FOCUS_MINUTES * 60);
    }

    #[test]
    fn work_day_preset_ignores_supplied_config() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let config = PomodoroConfig {
            focus_minutes: 1,
            short_break_minutes: 1,
            long_break_minutes: 1,
            rounds: 1,
        };
        let session =
            FocusSession::create("work day", 1, None, SessionType::WorkDay, Some(config), now);
        let state = session.pomodoro.as_ref().expect("pomodoro state");
        assert_eq!(state.focus_duration, WORK_DAY_FOCUS_MINUTES);
        assert_eq!(state.short_break_duration, WORK_DAY_SHORT_BREAK_MINUTES);
        assert_eq!(state.long_break_duration, WORK_DAY_LONG_BREAK_MINUTES);
        assert_eq!(state.total_pomodoro_rounds, WORK_DAY_ROUNDS);
    }

    #[test]
    fn focus_at_final_round_goes_to_long_break() {
        let state = sample_pomodoro_state(4, PomodoroPhase::Focus);
        assert_eq!(
            advance_phase(&state),
            PhaseOutcome::Transition {
                phase: PomodoroPhase::LongBreak,
                round: 4,
                minutes: 15,
                recorded_focus_minutes: Some(25),
            }
        );
    }

    #[test]
    fn focus_before_final_round_goes_to_short_break() {
        let state = sample_pomodoro_state(2, PomodoroPhase::Focus);
        assert_eq!(
            advance_phase(&state),
            PhaseOutcome::Transition {
                phase: PomodoroPhase::ShortBreak,
                round: 2,
                minutes: 5,
                recorded_focus_minutes: Some(25),
            }
        );
    }

    #[test]
    fn short_break_advances_the_round() {
        let state = sample_pomodoro_state(2, PomodoroPhase::ShortBreak);
        assert_eq!(
            advance_phase(&state),
            PhaseOutcome::Transition {
                phase: PomodoroPhase::Focus,
                round: 3,
                minutes: 25,
                recorded_focus_minutes: None,
            }
        );
    }

    #[test]
    fn long_break_completes_the_session() {
        let state = sample_pomodoro_state(4, PomodoroPhase::LongBreak);
        assert_eq!(advance_phase(&state), PhaseOutcome::Complete);
    }

    #[test]
    fn session_serde_round_trip_is_field_for_field() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let session = FocusSession::create(
            "deep dive",
            45,
            Some("https://youtu.be/abc123".to_string()),
            SessionType::Pomodoro,
            None,
            now,
        );
        let raw = serde_json::to_string(&session).expect("serialize session");
        let restored: FocusSession = serde_json::from_str(&raw).expect("deserialize session");
        assert_eq!(restored, session);

        // Pomodoro fields sit flattened in the record the way the original
        // app stored them.
        assert!(raw.contains("\"pomodoroPhase\":\"focus\""));
        assert!(raw.contains("\"sessionType\":\"pomodoro\""));
    }

    #[test]
    fn single_phase_session_omits_pomodoro_fields() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let session = FocusSession::create("read", 30, None, SessionType::DeepWork, None, now);
        let raw = serde_json::to_string(&session).expect("serialize session");
        assert!(!raw.contains("pomodoroPhase"));
        let restored: FocusSession = serde_json::from_str(&raw).expect("deserialize session");
        assert!(restored.pomodoro.is_none());
        assert_eq!(restored, session);
    }

    #[test]
    fn resumable_requires_active_and_unexpired() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut session = FocusSession::create("task", 10, None, SessionType::Custom, None, now);
        assert!(session.is_resumable(session.start_time + 1));
        assert!(!session.is_resumable(session.end_time));
        session.is_active = false;
        assert!(!session.is_resumable(session.start_time + 1));
    }

    #[test]
    fn streak_counts_consecutive_days_back_from_today() {
        let mut calendar = Calendar::default();
        let today = day(2026, 3, 4);
        calendar.record(today, 0.5);
        calendar.record(day(2026, 3, 3), 1.0);
        calendar.record(day(2026, 3, 2), 2.0);
        // 2026-03-01 stays empty.
        calendar.record(day(2026, 2, 28), 4.0);
        assert_eq!(calendar.streak(today), 3);
    }

    #[test]
    fn streak_is_zero_without_focus_today() {
        let mut calendar = Calendar::default();
        calendar.record(day(2026, 3, 3), 1.0);
        assert_eq!(calendar.streak(day(2026, 3, 4)), 0);
    }

    #[test]
    fn record_accumulates_and_never_subtracts() {
        let mut calendar = Calendar::default();
        let today = day(2026, 3, 4);
        calendar.record(today, 0.5);
        calendar.record(today, 0.25);
        calendar.record(today, -1.0);
        calendar.record(today, 0.0);
        assert!((calendar.hours_on(today) - 0.75).abs() < 1e-9);
        assert_eq!(calendar.active_days(), 1);
    }

    #[test]
    fn calendar_levels_bucket_hours() {
        assert_eq!(calendar_level(0.0), 0);
        assert_eq!(calendar_level(0.5), 1);
        assert_eq!(calendar_level(1.0), 2);
        assert_eq!(calendar_level(2.0), 3);
        assert_eq!(calendar_level(3.9), 3);
        assert_eq!(calendar_level(4.0), 4);
        assert_eq!(calendar_level(12.0), 4);
    }

    #[test]
    fn video_id_parses_both_known_shapes() {
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            youtube_video_id("https://youtu.be/dQw4w9WgXcQ?si=xyz"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(youtube_video_id("https://example.com/watch?v=abc"), None);
        assert_eq!(youtube_video_id("not a url"), None);
        assert_eq!(youtube_video_id("https://youtu.be/"), None);
    }

    #[test]
    fn task_toggle_tracks_completion_time() {
        let created = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let finished = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let mut task = Task::new("refactor storage", TaskKind::Code, created);
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.completed_at.is_none());

        task.toggle(finished);
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.completed_at, Some(finished));

        task.toggle(finished);
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn task_serde_uses_original_field_names() {
        let created = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let task = Task::new("sketch layout", TaskKind::Design, created);
        let raw = serde_json::to_string(&task).expect("serialize task");
        assert!(raw.contains("\"type\":\"Design\""));
        assert!(raw.contains("\"status\":\"todo\""));
        assert!(raw.contains("\"createdAt\""));
        let restored: Task = serde_json::from_str(&raw).expect("deserialize task");
        assert_eq!(restored, task);
    }

    #[test]
    fn clock_format_matches_the_timer_display() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(3600), "01:00:00");
        assert_eq!(format_clock(5405), "01:30:05");
    }
}
