use std::error::Error;
use std::io;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Datelike, Duration, Local, NaiveDate, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::config::Settings;
use crate::domain::{
	calendar_level, format_clock, youtube_video_id, Calendar, FocusSession, PomodoroPhase,
	PomodoroState, SessionType, Task, TaskKind, TaskStatus,
};
use crate::session::{SessionManager, TickOutcome};
use crate::storage::{save_calendar, save_tasks, KeyValueStore, StorageError};

const WEEKS_IN_GRID: usize = 53;
const MAX_SESSION_MINUTES: u32 = 1440;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
// Empty cell plus the four intensity steps of the contribution grid.
const LEVEL_COLORS: [Color; 5] = [
	Color::Rgb(31, 41, 55),
	Color::Rgb(30, 58, 138),
	Color::Rgb(29, 78, 216),
	Color::Rgb(59, 130, 246),
	Color::Rgb(96, 165, 250),
];
const LEVEL_CHARS: [char; 5] = ['.', '-', '+', '*', '#'];
const ROW_LABELS: [&str; 7] = ["   ", "Mon", "   ", "Wed", "   ", "Fri", "   "];
const MONTH_ABBR: [&str; 12] = [
	"Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn run_dashboard<S: KeyValueStore>(
	manager: &mut SessionManager<S>,
	tasks: &mut Vec<Task>,
	calendar: &mut Calendar,
	settings: &Settings,
) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, manager, tasks, calendar, settings);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop<S: KeyValueStore>(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	manager: &mut SessionManager<S>,
	tasks: &mut Vec<Task>,
	calendar: &mut Calendar,
	settings: &Settings,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();

	loop {
		apply_pending_ticks(&mut app, manager, calendar)?;
		app.clamp_task_selection(tasks);
		terminal.draw(|frame| draw_dashboard(frame, &app, manager.session(), tasks, calendar))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, manager, tasks, settings),
					InputMode::Select(_) => handle_select_key(&mut app, key.code, manager, tasks, settings),
					InputMode::Normal => handle_normal_key(&mut app, key.code, manager, tasks, calendar),
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

/// Applies one logical second per elapsed wall-clock second. Whenever the
/// session stops being tick-eligible the accumulator resets, so paused time
/// is never replayed on resume.
fn apply_pending_ticks<S: KeyValueStore>(
	app: &mut App,
	manager: &mut SessionManager<S>,
	calendar: &mut Calendar,
) -> Result<(), StorageError> {
	let eligible = manager
		.session()
		.is_some_and(|session| session.is_active && !session.is_paused);
	if !eligible {
		app.last_tick = Instant::now();
		return Ok(());
	}

	while app.last_tick.elapsed() >= StdDuration::from_secs(1) {
		app.last_tick += StdDuration::from_secs(1);
		let outcome = manager.tick(Utc::now())?;
		note_outcome(app, manager, calendar, outcome)?;
		if matches!(
			outcome,
			TickOutcome::Idle | TickOutcome::Completed { .. } | TickOutcome::Finished
		) {
			app.last_tick = Instant::now();
			break;
		}
	}

	Ok(())
}

/// Credits recorded focus time to today's bucket and narrates the outcome in
/// the status line.
fn note_outcome<S: KeyValueStore>(
	app: &mut App,
	manager: &mut SessionManager<S>,
	calendar: &mut Calendar,
	outcome: TickOutcome,
) -> Result<(), StorageError> {
	if let Some(minutes) = outcome.recorded_focus_minutes() {
		calendar.record(Local::now().date_naive(), f64::from(minutes) / 60.0);
		save_calendar(manager.store_mut(), calendar)?;
	}

	match outcome {
		TickOutcome::Completed { focus_minutes } => {
			app.status = format!("Session complete: {focus_minutes} focused minutes recorded");
		}
		TickOutcome::PhaseChanged { phase, round, .. } => {
			app.status = match phase {
				PomodoroPhase::Focus => format!("Round {round}: back to focus"),
				PomodoroPhase::ShortBreak => format!("Round {round} done, take a short break"),
				PomodoroPhase::LongBreak => "All rounds done, enjoy the long break".to_string(),
			};
		}
		TickOutcome::Finished => {
			app.status = "Pomodoro finished, great work".to_string();
		}
		TickOutcome::Idle | TickOutcome::Ticked => {}
	}

	Ok(())
}

fn draw_dashboard(
	frame: &mut Frame,
	app: &App,
	session: Option<&FocusSession>,
	tasks: &[Task],
	calendar: &Calendar,
) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(10), Constraint::Length(5)])
		.split(frame.area());

	let content = if app.show_tasks {
		let body = Layout::default()
			.direction(Direction::Horizontal)
			.constraints([Constraint::Min(40), Constraint::Length(38)])
			.split(layout[0]);
		render_tasks_panel(frame, body[1], app, tasks);
		body[0]
	} else {
		layout[0]
	};

	match session {
		Some(session) => render_session_panel(frame, content, session, calendar),
		None => render_idle_panel(frame, content, calendar),
	}
	render_footer(frame, layout[1], app, session);

	if app.show_calendar {
		render_calendar_popup(frame, calendar);
	}
	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select);
	}
}

fn render_idle_panel(frame: &mut Frame, area: Rect, calendar: &Calendar) {
	let today = Local::now().date_naive();
	let lines = vec![
		Line::from(""),
		Line::from(Span::styled(
			"Ready to lock in on your idea?",
			Style::default().add_modifier(Modifier::BOLD),
		)),
		Line::from(""),
		Line::from(format!("Days locked in: {}", calendar.streak(today))),
		Line::from(format!(
			"{:.1} focus hours across {} active days",
			calendar.total_hours(),
			calendar.active_days()
		)),
		Line::from(""),
		Line::from(Span::styled(
			"Press n to start a session",
			Style::default().fg(Color::DarkGray),
		)),
	];

	let panel = Paragraph::new(lines)
		.alignment(Alignment::Center)
		.block(Block::default().borders(Borders::ALL).title("lockin"));
	frame.render_widget(panel, area);
}

fn render_session_panel(frame: &mut Frame, area: Rect, session: &FocusSession, calendar: &Calendar) {
	let today = Local::now().date_naive();
	let mut lines = vec![
		Line::from(""),
		Line::from(vec![
			Span::styled(session.task.clone(), Style::default().add_modifier(Modifier::BOLD)),
			Span::styled(
				format!("  [{}]", session.session_type.label()),
				Style::default().fg(Color::DarkGray),
			),
		]),
		Line::from(""),
	];

	if session.is_active {
		let clock_style = if session.is_paused {
			Style::default().fg(Color::DarkGray)
		} else {
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
		};
		let mut clock_spans = vec![Span::styled(format_clock(session.time_remaining), clock_style)];
		if session.is_paused {
			clock_spans.push(Span::styled("  [paused]", Style::default().fg(Color::DarkGray)));
		}
		lines.push(Line::from(clock_spans));

		if let Some(state) = &session.pomodoro {
			lines.push(Line::from(""));
			lines.push(Line::from(format!(
				"{} - Round {} of {}",
				state.pomodoro_phase.label(),
				state.pomodoro_round,
				state.total_pomodoro_rounds
			)));
			lines.push(Line::from(Span::styled(
				round_dots(state),
				Style::default().fg(Color::Yellow),
			)));
		}
	} else {
		lines.push(Line::from(Span::styled(
			"Session Complete!",
			Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
		)));
		lines.push(Line::from(format!(
			"Amazing focus! You completed your {}-minute session.",
			session.duration
		)));
		lines.push(Line::from(Span::styled(
			"Press n to start a new session",
			Style::default().fg(Color::DarkGray),
		)));
	}

	lines.push(Line::from(""));
	if let Some(url) = &session.youtube_url {
		let video_text = match youtube_video_id(url) {
			Some(id) => format!("video: {id}"),
			None => "no video".to_string(),
		};
		lines.push(Line::from(Span::styled(
			video_text,
			Style::default().fg(Color::DarkGray),
		)));
	}
	lines.push(Line::from(format!("Days locked in: {}", calendar.streak(today))));

	let panel = Paragraph::new(lines)
		.alignment(Alignment::Center)
		.block(Block::default().borders(Borders::ALL).title("Focus Session"));
	frame.render_widget(panel, area);
}

fn round_dots(state: &PomodoroState) -> String {
	let mut dots = String::new();
	for round in 1..=state.total_pomodoro_rounds {
		let completed = round < state.pomodoro_round
			|| (round == state.pomodoro_round && state.pomodoro_phase != PomodoroPhase::Focus);
		dots.push(if completed { '●' } else { '○' });
		dots.push(' ');
	}
	dots.trim_end().to_string()
}

fn render_tasks_panel(frame: &mut Frame, area: Rect, app: &App, tasks: &[Task]) {
	let visible = visible_tasks(app.task_tab, tasks);
	let items = if visible.is_empty() {
		vec![ListItem::new("(no tasks)")]
	} else {
		visible
			.iter()
			.map(|task| {
				let mark = match task.status {
					TaskStatus::Todo => "[ ]",
					TaskStatus::Done => "[x]",
				};
				let style = match task.status {
					TaskStatus::Todo => Style::default(),
					TaskStatus::Done => Style::default().fg(Color::DarkGray),
				};
				ListItem::new(format!("{mark} {}  ({})", task.title, task.kind.label())).style(style)
			})
			.collect::<Vec<_>>()
	};

	let list = List::new(items)
		.block(Block::default().borders(Borders::ALL).title(format!(
			"Tasks - {} ({})",
			app.task_tab.label(),
			visible.len()
		)))
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !visible.is_empty() {
		state.select(Some(app.task_index.min(visible.len() - 1)));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn render_calendar_popup(frame: &mut Frame, calendar: &Calendar) {
	let area = centered_rect(90, 70, frame.area());
	frame.render_widget(Clear, area);

	let today = Local::now().date_naive();
	let year = today.year();
	let start = year_grid_start(year);

	let mut lines = vec![Line::from(Span::styled(
		format!("    {}", month_header(year)),
		Style::default().fg(Color::DarkGray),
	))];
	for row in 0..7 {
		let mut spans = vec![Span::styled(
			format!("{} ", ROW_LABELS[row]),
			Style::default().fg(Color::DarkGray),
		)];
		for week in 0..WEEKS_IN_GRID {
			let date = start + Duration::days((week * 7 + row) as i64);
			if date.year() == year {
				let level = calendar_level(calendar.hours_on(date));
				spans.push(Span::styled(
					"■ ",
					Style::default().fg(LEVEL_COLORS[level as usize]),
				));
			} else {
				spans.push(Span::raw("  "));
			}
		}
		lines.push(Line::from(spans));
	}

	lines.push(Line::from(""));
	lines.push(Line::from(format!(
		"{:.1} focus hours | {} active days | streak {} day(s)",
		calendar.total_hours(),
		calendar.active_days(),
		calendar.streak(today)
	)));
	let mut legend = vec![Span::styled("Less ", Style::default().fg(Color::DarkGray))];
	for color in LEVEL_COLORS {
		legend.push(Span::styled("■ ", Style::default().fg(color)));
	}
	legend.push(Span::styled("More", Style::default().fg(Color::DarkGray)));
	lines.push(Line::from(legend));
	lines.push(Line::from(Span::styled(
		"c or Esc to close",
		Style::default().fg(Color::DarkGray),
	)));

	let panel = Paragraph::new(lines).block(
		Block::default()
			.borders(Borders::ALL)
			.title(format!("Deep Work Contribution Calendar {year}")),
	);
	frame.render_widget(panel, area);
}

/// The Sunday on or before January 1st, so the grid rows line up Sun..Sat.
fn year_grid_start(year: i32) -> NaiveDate {
	let jan_first = NaiveDate::from_ymd_opt(year, 1, 1).expect("january 1st is valid");
	jan_first - Duration::days(i64::from(jan_first.weekday().num_days_from_sunday()))
}

/// Month abbreviations positioned over the week column where each month
/// starts; columns are two characters wide.
fn month_header(year: i32) -> String {
	let start = year_grid_start(year);
	let mut header = vec![' '; WEEKS_IN_GRID * 2];
	let mut last_month = 0;
	for week in 0..WEEKS_IN_GRID {
		let sunday = start + Duration::days((week * 7) as i64);
		if sunday.year() != year || sunday.month() == last_month {
			continue;
		}
		last_month = sunday.month();
		let abbr = MONTH_ABBR[(sunday.month() - 1) as usize];
		let offset = week * 2;
		if offset + abbr.len() <= header.len() {
			for (index, value) in abbr.chars().enumerate() {
				header[offset + index] = value;
			}
		}
	}
	header.into_iter().collect::<String>().trim_end().to_string()
}

/// Plain-text rendition of the contribution grid for the `calendar`
/// subcommand.
pub fn print_year_calendar(calendar: &Calendar, year: i32) {
	let start = year_grid_start(year);
	println!("Focus calendar {year}");
	println!("    {}", month_header(year));
	for row in 0..7 {
		let mut cells = String::new();
		for week in 0..WEEKS_IN_GRID {
			let date = start + Duration::days((week * 7 + row) as i64);
			if date.year() == year {
				cells.push(LEVEL_CHARS[calendar_level(calendar.hours_on(date)) as usize]);
			} else {
				cells.push(' ');
			}
			cells.push(' ');
		}
		println!("{} {}", ROW_LABELS[row], cells.trim_end());
	}
	println!();
	println!(
		"{:.1} focus hours | {} active days | levels: {}",
		calendar.total_hours(),
		calendar.active_days(),
		LEVEL_CHARS.iter().collect::<String>()
	);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, session: Option<&FocusSession>) {
	let footer_lines = match &app.mode {
		InputMode::Normal => {
			let shortcuts = match session {
				Some(session) if session.session_type.is_multi_phase() => {
					"space pause/resume | s skip phase | r reset phase | e end | c calendar | t tasks | q quit"
				}
				Some(_) => "space pause/resume | r reset | e end | n new | c calendar | t tasks | q quit",
				None => "n new session | a add task | c calendar | t tasks | q quit",
			};
			let task_hints = if app.show_tasks {
				"tasks: j/k move | Enter toggle | Tab todo/done | a add"
			} else {
				""
			};
			vec![
				Line::from(shortcuts),
				Line::from(task_hints),
				Line::from(app.status.clone()),
			]
		}
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines)
		.block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(62, 55, frame.area());
	frame.render_widget(Clear, area);

	let items = if select.options.is_empty() {
		vec![ListItem::new("(no choices)")]
	} else {
		select
			.options
			.iter()
			.map(|option| ListItem::new(option.label.clone()))
			.collect::<Vec<_>>()
	};

	let current = if select.options.is_empty() {
		0
	} else {
		select.selected.saturating_add(1)
	};
	let total = select.options.len();
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("{} ({current}/{total})", select.title)),
		)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len().saturating_sub(1))));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn handle_normal_key<S: KeyValueStore>(
	app: &mut App,
	code: KeyCode,
	manager: &mut SessionManager<S>,
	tasks: &mut Vec<Task>,
	calendar: &mut Calendar,
) -> bool {
	match code {
		KeyCode::Char('q') => return true,
		KeyCode::Esc => {
			if app.show_calendar {
				app.show_calendar = false;
			} else if app.show_tasks {
				app.show_tasks = false;
			} else {
				return true;
			}
		}
		KeyCode::Char('n') => {
			// Dismiss a finished session before starting over.
			if manager.session().is_some_and(|session| !session.is_active) {
				if let Err(err) = manager.end_session() {
					app.status = format!("error: {err}");
					return false;
				}
			}
			if manager.session().is_some() {
				app.status = "A session is already running (e to end it)".to_string();
			} else {
				app.mode = InputMode::Prompt(PromptState::new(
					"What are you locking in on?",
					PromptKind::StartTask,
				));
			}
		}
		KeyCode::Char(' ') => match manager.toggle_pause() {
			Ok(Some(true)) => app.status = "Paused".to_string(),
			Ok(Some(false)) => {
				app.status = "Resumed".to_string();
				app.last_tick = Instant::now();
			}
			Ok(None) => app.status = "No session to pause".to_string(),
			Err(err) => app.status = format!("error: {err}"),
		},
		KeyCode::Char('e') => {
			if manager.session().is_some() {
				app.mode = InputMode::Select(build_end_session_select());
			} else {
				app.status = "No session to end".to_string();
			}
		}
		KeyCode::Char('s') => match manager.skip_phase(Utc::now()) {
			Ok(TickOutcome::Idle) => app.status = "Nothing to skip".to_string(),
			Ok(outcome) => {
				if let Err(err) = note_outcome(app, manager, calendar, outcome) {
					app.status = format!("error: {err}");
				}
				app.last_tick = Instant::now();
			}
			Err(err) => app.status = format!("error: {err}"),
		},
		KeyCode::Char('r') => match manager.reset_phase() {
			Ok(true) => {
				app.status = "Timer reset".to_string();
				app.last_tick = Instant::now();
			}
			Ok(false) => app.status = "No session to reset".to_string(),
			Err(err) => app.status = format!("error: {err}"),
		},
		KeyCode::Char('c') => app.show_calendar = !app.show_calendar,
		KeyCode::Char('t') => app.show_tasks = !app.show_tasks,
		KeyCode::Char('a') => {
			app.mode = InputMode::Prompt(PromptState::new("Task title", PromptKind::AddTaskTitle));
		}
		KeyCode::Tab => {
			if app.show_tasks {
				app.task_tab = app.task_tab.next();
				app.task_index = 0;
			}
		}
		KeyCode::Up | KeyCode::Char('k') => app.move_task_selection(-1, tasks),
		KeyCode::Down | KeyCode::Char('j') => app.move_task_selection(1, tasks),
		KeyCode::Enter => {
			if app.show_tasks {
				toggle_selected_task(app, manager, tasks);
			}
		}
		_ => {}
	}

	false
}

fn toggle_selected_task<S: KeyValueStore>(
	app: &mut App,
	manager: &mut SessionManager<S>,
	tasks: &mut Vec<Task>,
) {
	let selected_id = visible_tasks(app.task_tab, tasks)
		.get(app.task_index)
		.map(|task| task.id.clone());
	let Some(id) = selected_id else {
		app.status = "No task selected".to_string();
		return;
	};

	let mut toggled = None;
	if let Some(task) = tasks.iter_mut().find(|task| task.id == id) {
		task.toggle(Utc::now());
		toggled = Some((task.title.clone(), task.status));
	}
	let Some((title, status)) = toggled else {
		return;
	};

	match save_tasks(manager.store_mut(), tasks) {
		Ok(()) => {
			app.status = match status {
				TaskStatus::Done => format!("Done: {title}"),
				TaskStatus::Todo => format!("Reopened: {title}"),
			};
		}
		Err(err) => app.status = format!("error: {err}"),
	}
}

fn handle_prompt_key<S: KeyValueStore>(
	app: &mut App,
	code: KeyCode,
	manager: &mut SessionManager<S>,
	tasks: &mut Vec<Task>,
	settings: &Settings,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				InputMode::Normal | InputMode::Select(_) => return false,
			};

			match submit_prompt(prompt.clone(), manager, tasks, settings) {
				Ok(PromptOutcome::NextPrompt(next_prompt)) => app.mode = InputMode::Prompt(next_prompt),
				Ok(PromptOutcome::Select(select)) => app.mode = InputMode::Select(select),
				Ok(PromptOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
					app.last_tick = Instant::now();
				}
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_select_key<S: KeyValueStore>(
	app: &mut App,
	code: KeyCode,
	manager: &mut SessionManager<S>,
	tasks: &mut Vec<Task>,
	settings: &Settings,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Select(select) => select,
				_ => return false,
			};

			match submit_select(select.clone(), manager, tasks, settings) {
				Ok(SelectOutcome::NextPrompt(prompt)) => app.mode = InputMode::Prompt(prompt),
				Ok(SelectOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
					app.last_tick = Instant::now();
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt<S: KeyValueStore>(
	prompt: PromptState,
	manager: &mut SessionManager<S>,
	_tasks: &mut Vec<Task>,
	settings: &Settings,
) -> Result<PromptOutcome, String> {
	match prompt.kind {
		PromptKind::StartTask => {
			let task = required_text(&prompt.input, "task")?;
			Ok(PromptOutcome::NextPrompt(PromptState::new(
				format!("Minutes (Enter for {})", settings.default_session_minutes),
				PromptKind::StartMinutes { task },
			)))
		}
		PromptKind::StartMinutes { task } => {
			let minutes = parse_minutes(&prompt.input, settings.default_session_minutes)?;
			Ok(PromptOutcome::Select(build_session_type_select(
				task, minutes, settings,
			)))
		}
		PromptKind::StartYoutube {
			task,
			minutes,
			session_type,
		} => {
			let input = prompt.input.trim();
			let youtube_url = if input.is_empty() {
				None
			} else {
				Some(input.to_string())
			};
			let config = if session_type == SessionType::Pomodoro {
				Some(settings.pomodoro_config())
			} else {
				None
			};
			let message = format!("Locked in: {task}");
			manager
				.create_session(task, minutes, youtube_url, session_type, config)
				.map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(message))
		}
		PromptKind::AddTaskTitle => {
			let title = required_text(&prompt.input, "task title")?;
			Ok(PromptOutcome::Select(build_task_kind_select(title)))
		}
	}
}

fn submit_select<S: KeyValueStore>(
	select: SelectState,
	manager: &mut SessionManager<S>,
	tasks: &mut Vec<Task>,
	_settings: &Settings,
) -> Result<SelectOutcome, String> {
	let choice = select
		.selected_option()
		.ok_or_else(|| "nothing to choose".to_string())?
		.value
		.clone();

	match select.kind {
		SelectKind::StartType { task, minutes } => {
			let session_type = SessionType::parse(&choice)?;
			Ok(SelectOutcome::NextPrompt(PromptState::new(
				"YouTube URL (optional)",
				PromptKind::StartYoutube {
					task,
					minutes,
					session_type,
				},
			)))
		}
		SelectKind::TaskKind { title } => {
			let kind = TaskKind::parse(&choice)?;
			let task = Task::new(title, kind, Utc::now());
			let message = format!("Added task: {}", task.title);
			tasks.insert(0, task);
			save_tasks(manager.store_mut(), tasks).map_err(|err| err.to_string())?;
			Ok(SelectOutcome::Done(message))
		}
		SelectKind::EndSessionConfirm => {
			if choice == "end" {
				manager.end_session().map_err(|err| err.to_string())?;
				Ok(SelectOutcome::Done("Session ended".to_string()))
			} else {
				Ok(SelectOutcome::Done("End cancelled".to_string()))
			}
		}
	}
}

fn build_session_type_select(task: String, minutes: u32, settings: &Settings) -> SelectState {
	let pomodoro = &settings.pomodoro;
	let options = vec![
		SelectOption::new(format!("Custom ({minutes} min)"), "custom"),
		SelectOption::new(format!("Deep Work ({minutes} min)"), "deep-work"),
		SelectOption::new(
			format!(
				"Pomodoro ({}/{}/{} x{})",
				pomodoro.focus_minutes,
				pomodoro.short_break_minutes,
				pomodoro.long_break_minutes,
				pomodoro.rounds
			),
			"pomodoro",
		),
		SelectOption::new("Work Day (50/10/60 x8)", "work-day"),
	];
	SelectState::new("Session type", SelectKind::StartType { task, minutes }, options)
}

fn build_task_kind_select(title: String) -> SelectState {
	let options = vec![
		SelectOption::new("Code", "code"),
		SelectOption::new("Study", "study"),
		SelectOption::new("Design", "design"),
	];
	SelectState::new("Task kind", SelectKind::TaskKind { title }, options)
}

fn build_end_session_select() -> SelectState {
	let options = vec![
		SelectOption::new("Keep going", "cancel"),
		SelectOption::new("End the session", "end"),
	];
	SelectState::new("End this focus session early?", SelectKind::EndSessionConfirm, options)
}

fn required_text(input: &str, what: &str) -> Result<String, String> {
	let value = input.trim().to_string();
	if value.is_empty() {
		Err(format!("{what} cannot be empty"))
	} else {
		Ok(value)
	}
}

fn parse_minutes(input: &str, default_minutes: u32) -> Result<u32, String> {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		return Ok(default_minutes);
	}
	let minutes = trimmed
		.parse::<u32>()
		.map_err(|_| format!("'{trimmed}' is not a number of minutes"))?;
	if minutes == 0 || minutes > MAX_SESSION_MINUTES {
		return Err(format!("minutes must be between 1 and {MAX_SESSION_MINUTES}"));
	}
	Ok(minutes)
}

fn visible_tasks(tab: TaskTab, tasks: &[Task]) -> Vec<&Task> {
	tasks
		.iter()
		.filter(|task| task.status == tab.status())
		.collect()
}

#[derive(Debug, Clone)]
enum PromptOutcome {
	NextPrompt(PromptState),
	Select(SelectState),
	Done(String),
}

#[derive(Debug, Clone)]
enum SelectOutcome {
	NextPrompt(PromptState),
	Done(String),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input: String::new(),
			kind,
		}
	}
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: String,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			value: value.into(),
		}
	}
}

#[derive(Debug, Clone)]
enum PromptKind {
	StartTask,
	StartMinutes {
		task: String,
	},
	StartYoutube {
		task: String,
		minutes: u32,
		session_type: SessionType,
	},
	AddTaskTitle,
}

#[derive(Debug, Clone)]
enum SelectKind {
	StartType { task: String, minutes: u32 },
	TaskKind { title: String },
	EndSessionConfirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTab {
	Todo,
	Done,
}

impl TaskTab {
	fn next(self) -> Self {
		match self {
			TaskTab::Todo => TaskTab::Done,
			TaskTab::Done => TaskTab::Todo,
		}
	}

	fn status(self) -> TaskStatus {
		match self {
			TaskTab::Todo => TaskStatus::Todo,
			TaskTab::Done => TaskStatus::Done,
		}
	}

	fn label(self) -> &'static str {
		match self {
			TaskTab::Todo => "To Do",
			TaskTab::Done => "Done",
		}
	}
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

#[derive(Debug, Clone)]
struct App {
	mode: InputMode,
	show_calendar: bool,
	show_tasks: bool,
	task_tab: TaskTab,
	task_index: usize,
	last_tick: Instant,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			mode: InputMode::Normal,
			show_calendar: false,
			show_tasks: false,
			task_tab: TaskTab::Todo,
			task_index: 0,
			last_tick: Instant::now(),
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn clamp_task_selection(&mut self, tasks: &[Task]) {
		let visible = visible_tasks(self.task_tab, tasks).len();
		if visible == 0 {
			self.task_index = 0;
		} else {
			self.task_index = self.task_index.min(visible - 1);
		}
	}

	fn move_task_selection(&mut self, delta: i32, tasks: &[Task]) {
		let visible = visible_tasks(self.task_tab, tasks).len();
		if visible == 0 {
			self.task_index = 0;
			return;
		}

		if delta > 0 {
			self.task_index = (self.task_index + delta as usize).min(visible - 1);
		} else {
			self.task_index = self.task_index.saturating_sub(delta.unsigned_abs() as usize);
		}
	}
}

#[cfg(test)]
mod tests {
	use chrono::Datelike;

	use super::*;

	#[test]
	fn grid_starts_on_the_sunday_covering_january_first() {
		for year in [2024, 2025, 2026, 2027] {
			let start = year_grid_start(year);
			assert_eq!(start.weekday().num_days_from_sunday(), 0);
			let jan_first = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
			assert!(start <= jan_first);
			assert!(jan_first - start < Duration::days(7));
		}
	}

	#[test]
	fn month_header_opens_with_january() {
		let header = month_header(2026);
		assert!(header.contains("Jan"));
		assert!(header.contains("Dec"));
		assert!(header.find("Jan").unwrap() < header.find("Feb").unwrap());
	}

	#[test]
	fn round_dots_fill_after_each_focus_phase() {
		let mut state = PomodoroState {
			pomodoro_phase: PomodoroPhase::Focus,
			pomodoro_round: 1,
			total_pomodoro_rounds: 4,
			focus_duration: 25,
			short_break_duration: 5,
			long_break_duration: 15,
		};
		assert_eq!(round_dots(&state), "○ ○ ○ ○");

		state.pomodoro_phase = PomodoroPhase::ShortBreak;
		assert_eq!(round_dots(&state), "● ○ ○ ○");

		state.pomodoro_phase = PomodoroPhase::Focus;
		state.pomodoro_round = 3;
		assert_eq!(round_dots(&state), "● ● ○ ○");

		state.pomodoro_phase = PomodoroPhase::LongBreak;
		state.pomodoro_round = 4;
		assert_eq!(round_dots(&state), "● ● ● ●");
	}

	#[test]
	fn minutes_prompt_accepts_blank_as_default() {
		assert_eq!(parse_minutes("", 25), Ok(25));
		assert_eq!(parse_minutes("  ", 50), Ok(50));
		assert_eq!(parse_minutes("90", 25), Ok(90));
		assert!(parse_minutes("0", 25).is_err());
		assert!(parse_minutes("1441", 25).is_err());
		assert!(parse_minutes("soon", 25).is_err());
	}

	#[test]
	fn visible_tasks_follow_the_tab() {
		let now = Utc::now();
		let mut done = Task::new("done task", TaskKind::Code, now);
		done.toggle(now);
		let tasks = vec![Task::new("open task", TaskKind::Study, now), done];

		let todo = visible_tasks(TaskTab::Todo, &tasks);
		assert_eq!(todo.len(), 1);
		assert_eq!(todo[0].title, "open task");

		let done = visible_tasks(TaskTab::Done, &tasks);
		assert_eq!(done.len(), 1);
		assert_eq!(done[0].title, "done task");
	}
}
