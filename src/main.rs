mod config;
mod domain;
mod paths;
mod session;
mod storage;
mod ui;

use std::error::Error;
use std::path::PathBuf;

use chrono::{Datelike, Local, TimeZone, Utc};
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::domain::{
	format_clock, FocusSession, PomodoroConfig, SessionType, Task, TaskKind, TaskStatus,
};
use crate::paths::resolve_data_dir;
use crate::session::{SessionManager, TickOutcome};
use crate::storage::{load_calendar, load_tasks, save_calendar, save_tasks, FileStore};
use crate::ui::{print_year_calendar, run_dashboard};

#[derive(Debug, Parser)]
#[command(name = "lockin", about = "Terminal-first focus timer")]
struct Cli {
	#[arg(long)]
	data_dir: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Dashboard,
	Start {
		#[arg(long)]
		task: String,
		#[arg(long)]
		minutes: Option<u32>,
		#[arg(long, default_value = "custom")]
		session_type: String,
		#[arg(long)]
		youtube: Option<String>,
		#[arg(long)]
		focus: Option<u32>,
		#[arg(long)]
		short_break: Option<u32>,
		#[arg(long)]
		long_break: Option<u32>,
		#[arg(long)]
		rounds: Option<u32>,
	},
	Status,
	Pause,
	Resume,
	End,
	SkipPhase,
	ResetPhase,
	AddTask {
		#[arg(long)]
		title: String,
		#[arg(long, default_value = "code")]
		kind: String,
	},
	Tasks,
	ToggleTask {
		#[arg(long)]
		id: String,
	},
	Calendar {
		#[arg(long)]
		year: Option<i32>,
	},
	Streak,
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let data_dir = resolve_data_dir(cli.data_dir);
	let settings = Settings::load(&data_dir);
	let store = FileStore::open(&data_dir)?;
	let mut manager = SessionManager::load(store)?;

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Dashboard => {
			let mut tasks = load_tasks(manager.store_mut())?;
			let mut calendar = load_calendar(manager.store_mut())?;
			run_dashboard(&mut manager, &mut tasks, &mut calendar, &settings)?;
		}
		Command::Start {
			task,
			minutes,
			session_type,
			youtube,
			focus,
			short_break,
			long_break,
			rounds,
		} => {
			let session_type = SessionType::parse(&session_type)?;
			let minutes = minutes.unwrap_or(settings.default_session_minutes);
			let config = if session_type == SessionType::Pomodoro {
				let defaults = settings.pomodoro_config();
				Some(PomodoroConfig {
					focus_minutes: focus.unwrap_or(defaults.focus_minutes),
					short_break_minutes: short_break.unwrap_or(defaults.short_break_minutes),
					long_break_minutes: long_break.unwrap_or(defaults.long_break_minutes),
					rounds: rounds.unwrap_or(defaults.rounds),
				})
			} else {
				None
			};
			let session = manager.create_session(task, minutes, youtube, session_type, config)?;
			println!(
				"locked in: {} ({}, {} min, until {})",
				session.task,
				session.session_type.label(),
				session.duration,
				format_local_time(session.end_time)
			);
		}
		Command::Status => match manager.session() {
			Some(session) => print_status(session),
			None => println!("no active session"),
		},
		Command::Pause => {
			if manager.set_paused(true)? {
				println!("paused");
			} else {
				println!("no active session");
			}
		}
		Command::Resume => {
			if manager.set_paused(false)? {
				println!("resumed");
			} else {
				println!("no active session");
			}
		}
		Command::End => {
			if manager.session().is_some() {
				manager.end_session()?;
				println!("session ended");
			} else {
				println!("no active session");
			}
		}
		Command::SkipPhase => {
			let outcome = manager.skip_phase(Utc::now())?;
			if let Some(minutes) = outcome.recorded_focus_minutes() {
				let mut calendar = load_calendar(manager.store_mut())?;
				calendar.record(Local::now().date_naive(), f64::from(minutes) / 60.0);
				save_calendar(manager.store_mut(), &calendar)?;
			}
			match outcome {
				TickOutcome::Idle => println!("nothing to skip"),
				TickOutcome::Finished => println!("pomodoro finished"),
				TickOutcome::PhaseChanged { phase, round, .. } => {
					println!("now in {} (round {round})", phase.label().to_lowercase());
				}
				TickOutcome::Ticked | TickOutcome::Completed { .. } => {}
			}
		}
		Command::ResetPhase => {
			if manager.reset_phase()? {
				println!("timer reset");
			} else {
				println!("no active session");
			}
		}
		Command::AddTask { title, kind } => {
			let kind = TaskKind::parse(&kind)?;
			let mut tasks = load_tasks(manager.store_mut())?;
			let task = Task::new(title, kind, Utc::now());
			println!("added task {} ({})", task.id, task.title);
			tasks.insert(0, task);
			save_tasks(manager.store_mut(), &tasks)?;
		}
		Command::Tasks => {
			let tasks = load_tasks(manager.store_mut())?;
			if tasks.is_empty() {
				println!("no tasks yet");
			}
			for task in &tasks {
				let mark = match task.status {
					TaskStatus::Todo => "[ ]",
					TaskStatus::Done => "[x]",
				};
				println!("{mark} {} | {} | {}", task.id, task.kind.label(), task.title);
			}
		}
		Command::ToggleTask { id } => {
			let mut tasks = load_tasks(manager.store_mut())?;
			let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
				return Err(format!("no task with id {id}").into());
			};
			task.toggle(Utc::now());
			let line = match task.status {
				TaskStatus::Done => format!("done: {}", task.title),
				TaskStatus::Todo => format!("reopened: {}", task.title),
			};
			save_tasks(manager.store_mut(), &tasks)?;
			println!("{line}");
		}
		Command::Calendar { year } => {
			let calendar = load_calendar(manager.store_mut())?;
			print_year_calendar(&calendar, year.unwrap_or_else(|| Local::now().year()));
		}
		Command::Streak => {
			let calendar = load_calendar(manager.store_mut())?;
			println!("{} day(s) locked in", calendar.streak(Local::now().date_naive()));
		}
	}

	Ok(())
}

fn print_status(session: &FocusSession) {
	println!("task: {}", session.task);
	println!("type: {}", session.session_type.label());
	if let Some(state) = &session.pomodoro {
		println!(
			"phase: {} (round {} of {})",
			state.pomodoro_phase.label().to_lowercase(),
			state.pomodoro_round,
			state.total_pomodoro_rounds
		);
	}
	let flag = if session.is_paused { " (paused)" } else { "" };
	println!("remaining: {}{flag}", format_clock(session.time_remaining));
	println!("ends at: {}", format_local_time(session.end_time));
	if let Some(url) = &session.youtube_url {
		println!("video: {url}");
	}
}

fn format_local_time(millis: i64) -> String {
	match Utc.timestamp_millis_opt(millis) {
		chrono::LocalResult::Single(moment) => moment
			.with_timezone(&Local)
			.format("%Y-%m-%d %H:%M")
			.to_string(),
		_ => format!("{millis} ms"),
	}
}
