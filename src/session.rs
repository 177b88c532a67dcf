use chrono::{DateTime, Utc};

use crate::domain::{
    FocusSession, PhaseOutcome, PomodoroConfig, PomodoroPhase, SessionType, advance_phase,
};
use crate::storage::{KeyValueStore, SESSION_KEY, StorageError};

/// What a logical 1-second tick (or a manual phase skip) did. Calendar
/// crediting is the caller's job: whenever `recorded_focus_minutes` yields
/// minutes, they belong in today's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session, or the session is paused/inactive.
    Idle,
    /// The countdown decremented and stayed above zero.
    Ticked,
    /// A single-phase session ran out; it stays in the slot, inactive, until
    /// the user dismisses it.
    Completed { focus_minutes: u32 },
    /// A Pomodoro-style session moved to its next phase.
    PhaseChanged {
        phase: PomodoroPhase,
        round: u32,
        recorded_focus_minutes: Option<u32>,
    },
    /// The long break ended; the session is gone.
    Finished,
}

impl TickOutcome {
    /// Focus minutes this outcome asks the caller to credit to the calendar.
    pub fn recorded_focus_minutes(self) -> Option<u32> {
        match self {
            TickOutcome::Completed { focus_minutes } => Some(focus_minutes),
            TickOutcome::PhaseChanged {
                recorded_focus_minutes,
                ..
            } => recorded_focus_minutes,
            _ => None,
        }
    }
}

/// Owns the single focus-session slot and keeps it in step with the store:
/// every mutation persists before returning.
pub struct SessionManager<S: KeyValueStore> {
    store: S,
    session: Option<FocusSession>,
}

impl<S: KeyValueStore> SessionManager<S> {
    /// Restores the persisted session, if any. A record that fails to decode
    /// is cleared; a decoded session is kept only while it is still active
    /// and its deadline has not passed.
    pub fn load(mut store: S) -> Result<Self, StorageError> {
        let session = match store.get(SESSION_KEY)? {
            None => None,
            Some(raw) => match serde_json::from_str::<FocusSession>(&raw) {
                Ok(session) if session.is_resumable(Utc::now().timestamp_millis()) => {
                    Some(session)
                }
                Ok(_) => {
                    store.remove(SESSION_KEY)?;
                    None
                }
                Err(err) => {
                    eprintln!("warning: discarding malformed session record: {err}");
                    store.remove(SESSION_KEY)?;
                    None
                }
            },
        };
        Ok(Self { store, session })
    }

    pub fn session(&self) -> Option<&FocusSession> {
        self.session.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    #[cfg(test)]
    fn into_store(self) -> S {
        self.store
    }

    /// Starts a new session, replacing whatever occupied the slot.
    pub fn create_session(
        &mut self,
        task: impl Into<String>,
        duration_minutes: u32,
        youtube_url: Option<String>,
        session_type: SessionType,
        config: Option<PomodoroConfig>,
    ) -> Result<&FocusSession, StorageError> {
        let session = self.session.insert(FocusSession::create(
            task,
            duration_minutes,
            youtube_url,
            session_type,
            config,
            Utc::now(),
        ));
        Self::persist(&mut self.store, session)?;
        Ok(session)
    }

    /// Applies an arbitrary mutation and persists. Returns whether a session
    /// existed to mutate.
    pub fn update(&mut self, apply: impl FnOnce(&mut FocusSession)) -> Result<bool, StorageError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        apply(session);
        Self::persist(&mut self.store, session)?;
        Ok(true)
    }

    pub fn set_paused(&mut self, paused: bool) -> Result<bool, StorageError> {
        self.update(|session| session.is_paused = paused)
    }

    /// Flips the pause flag; returns the new state, or `None` without a
    /// session.
    pub fn toggle_pause(&mut self) -> Result<Option<bool>, StorageError> {
        let mut paused = None;
        self.update(|session| {
            session.is_paused = !session.is_paused;
            paused = Some(session.is_paused);
        })?;
        Ok(paused)
    }

    pub fn end_session(&mut self) -> Result<(), StorageError> {
        self.session = None;
        self.store.remove(SESSION_KEY)
    }

    /// One logical second. Paused or inactive sessions are left untouched.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, StorageError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(TickOutcome::Idle);
        };
        if !session.is_active || session.is_paused {
            return Ok(TickOutcome::Idle);
        }

        session.time_remaining = session.time_remaining.saturating_sub(1);
        if session.time_remaining > 0 {
            Self::persist(&mut self.store, session)?;
            return Ok(TickOutcome::Ticked);
        }

        if session.pomodoro.is_some() {
            return self.advance_pomodoro(now);
        }

        session.is_active = false;
        session.time_remaining = 0;
        let focus_minutes = session.duration;
        Self::persist(&mut self.store, session)?;
        Ok(TickOutcome::Completed { focus_minutes })
    }

    /// Forces the current Pomodoro phase to end now. `Idle` for single-phase
    /// sessions and an empty slot.
    pub fn skip_phase(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, StorageError> {
        self.advance_pomodoro(now)
    }

    /// Reloads the countdown to the current phase's full length without
    /// transitioning.
    pub fn reset_phase(&mut self) -> Result<bool, StorageError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        let minutes = match &session.pomodoro {
            Some(state) => state.current_phase_minutes(),
            None => session.duration,
        };
        session.time_remaining = minutes * 60;
        Self::persist(&mut self.store, session)?;
        Ok(true)
    }

    fn advance_pomodoro(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, StorageError> {
        let outcome = match self
            .session
            .as_ref()
            .and_then(|session| session.pomodoro.as_ref())
        {
            Some(state) => advance_phase(state),
            None => return Ok(TickOutcome::Idle),
        };

        match outcome {
            PhaseOutcome::Complete => {
                self.session = None;
                self.store.remove(SESSION_KEY)?;
                Ok(TickOutcome::Finished)
            }
            PhaseOutcome::Transition {
                phase,
                round,
                minutes,
                recorded_focus_minutes,
            } => {
                let Some(session) = self.session.as_mut() else {
                    return Ok(TickOutcome::Idle);
                };
                if let Some(state) = session.pomodoro.as_mut() {
                    state.pomodoro_phase = phase;
                    state.pomodoro_round = round;
                }
                session.duration = minutes;
                session.time_remaining = minutes * 60;
                // Keep the load-time expiry check meaningful across phases.
                session.end_time = now.timestamp_millis() + i64::from(minutes) * 60_000;
                Self::persist(&mut self.store, session)?;
                Ok(TickOutcome::PhaseChanged {
                    phase,
                    round,
                    recorded_focus_minutes,
                })
            }
        }
    }

    fn persist(store: &mut S, session: &FocusSession) -> Result<(), StorageError> {
        let raw = serde_json::to_string(session).map_err(StorageError::JsonEncode)?;
        store.set(SESSION_KEY, raw)
    }
}
