mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use itertools::Itertools;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use setwise::{
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    history::{Completion, HistoryDb},
    logging,
    progress::ProgressStore,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Metronome, Runner},
    session::{RunningState, WorkoutSession},
    store::{FileKvStore, KvStore},
    util::{format_clock, format_minutes, format_volume},
    week::iso_week_label,
    workout::{Catalog, WorkoutSource},
};
use std::{
    error::Error,
    io::{self, stdin, Write},
    path::PathBuf,
    time::{Duration, Instant},
};
use time_humanize::{Accuracy, HumanTime, Tense};
use tracing::{error, info, warn};

/// terminal workout runner with rest timers and resumable weekly progress
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Walks you through a workout set by set with rest countdowns. Progress is saved after every set and resumes where you left off for the rest of the ISO week."
)]
pub struct Cli {
    /// directory with additional workout definitions (*.json)
    #[clap(long, global = true)]
    workouts_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,

    /// workout to run (shorthand for `run <WORKOUT>`)
    workout: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// run a workout in the terminal UI
    Run { workout: String },
    /// list available workouts
    List,
    /// show this week's saved progress for a workout
    Status { workout: String },
    /// forget saved progress for a workout
    Reset { workout: String },
    /// show finished workouts and the weekly streak
    History {
        /// number of entries to show
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// export every entry as CSV to stdout
        #[clap(long, conflicts_with = "clear")]
        csv: bool,

        /// delete every recorded workout
        #[clap(long)]
        clear: bool,
    },
    /// show the configuration file and its effective values
    Config {
        /// write the effective configuration to the file
        #[clap(long)]
        init: bool,
    },
}

impl Cli {
    fn resolved_command(&self) -> Command {
        match (&self.command, &self.workout) {
            (Some(cmd), _) => cmd.clone(),
            (None, Some(workout)) => Command::Run {
                workout: workout.clone(),
            },
            (None, None) => Command::List,
        }
    }

    fn catalog(&self, config: &Config) -> Catalog {
        let dir = self.workouts_dir.clone().or_else(|| config.workouts_dir.clone());
        match dir {
            Some(dir) => Catalog::builtin().with_dir(dir),
            None => Catalog::builtin(),
        }
    }
}

fn progress_store() -> ProgressStore<FileKvStore, SystemClock> {
    let path = AppDirs::progress_path().unwrap_or_else(|| PathBuf::from("setwise_progress.json"));
    ProgressStore::new(FileKvStore::with_path(path), SystemClock)
}

fn open_history() -> Option<HistoryDb> {
    let path = AppDirs::history_db_path().unwrap_or_else(|| PathBuf::from("setwise_history.db"));
    match HistoryDb::open(&path) {
        Ok(db) => Some(db),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "history unavailable");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Session,
    Summary,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App<S: KvStore = FileKvStore, C: Clock = SystemClock> {
    pub session: WorkoutSession<S, C>,
    pub history: Option<HistoryDb>,
    pub state: AppState,
    pub recorded: bool,
    pub streak: Option<u32>,
    pub week_count: Option<usize>,
}

impl<S: KvStore, C: Clock> App<S, C> {
    pub fn new(session: WorkoutSession<S, C>, history: Option<HistoryDb>) -> Self {
        let state = if session.is_finished() {
            AppState::Summary
        } else {
            AppState::Session
        };
        Self {
            session,
            history,
            state,
            recorded: false,
            streak: None,
            week_count: None,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Control {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Control::Quit;
        }

        match (self.state, key.code) {
            (_, KeyCode::Esc) | (_, KeyCode::Char('q')) => return Control::Quit,
            (AppState::Help, _) => self.state = AppState::Session,
            (_, KeyCode::Char('?')) => self.state = AppState::Help,
            (_, KeyCode::Char('r')) => {
                self.session.reset();
                self.recorded = false;
                self.state = AppState::Session;
            }
            (AppState::Summary, _) => {}
            (AppState::Session, KeyCode::Char(' ')) | (AppState::Session, KeyCode::Enter) => {
                self.primary_action();
            }
            (AppState::Session, KeyCode::Char('s')) => {
                self.session.skip_rest();
            }
            (AppState::Session, KeyCode::Char('p')) => {
                if !self.session.pause_rest() {
                    self.session.resume_rest();
                }
            }
            (AppState::Session, KeyCode::Char('n')) => {
                self.session.skip_exercise();
            }
            _ => {}
        }

        self.after_transition();
        Control::Continue
    }

    /// One second of wall-clock time passed
    pub fn on_second(&mut self) {
        self.session.tick();
    }

    /// The single "do the obvious next thing" button
    fn primary_action(&mut self) {
        match self.session.running_state() {
            RunningState::Idle => {
                self.session.start();
            }
            RunningState::Active => {
                self.session.complete_current_set();
            }
            RunningState::Resting | RunningState::RestingPaused => {
                self.session.skip_rest();
            }
            RunningState::Finished => {}
        }
    }

    fn after_transition(&mut self) {
        if !self.session.is_finished() {
            return;
        }
        if self.state == AppState::Session {
            self.state = AppState::Summary;
        }
        if self.recorded {
            return;
        }
        self.recorded = true;

        let Some(db) = &self.history else {
            return;
        };
        if let Some(summary) = self.session.summary() {
            if let Err(e) = db.record(&Completion::from(&summary)) {
                warn!(error = %e, "failed to record completion");
            }
            self.streak = db.weekly_streak(&summary.week).ok();
            self.week_count = db.completions_in_week(&summary.week).ok();
        }
    }
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        error!(error = %e, "exiting with error");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config_store = FileConfigStore::new();
    let config = config_store.load();
    if let Some(log_path) = AppDirs::log_path() {
        // logging is a convenience; never refuse to run over it
        if let Err(e) = logging::init(&config.log_filter, &log_path) {
            eprintln!("warning: logging disabled: {e}");
        }
    }

    let catalog = cli.catalog(&config);
    let command = cli.resolved_command();
    info!(?command, "starting");

    match command {
        Command::List => print_list(&catalog, &mut io::stdout()),
        Command::Status { workout } => print_status(&catalog, &workout, &mut io::stdout()),
        Command::Reset { workout } => {
            let mut progress = progress_store();
            let removed = progress.try_clear(&workout)?;
            println!("cleared {removed} saved snapshot(s) for {workout}");
            Ok(())
        }
        Command::History { limit, csv, clear } => {
            let db = open_history().ok_or("history database unavailable")?;
            if clear {
                let removed = db.clear_all()?;
                println!("removed {removed} finished workout(s) from history");
                Ok(())
            } else if csv {
                db.export_csv(io::stdout())?;
                Ok(())
            } else {
                print_history(&db, limit, &mut io::stdout())
            }
        }
        Command::Config { init } => {
            print_config(&config_store, &config, init, &mut io::stdout())
        }
        Command::Run { workout } => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            let definition = catalog.fetch(&workout)?;
            let session = WorkoutSession::new(definition, progress_store())?;
            let history = if config.record_history {
                open_history()
            } else {
                None
            };
            let mut app = App::new(session, history);
            let tick_rate = Duration::from_millis(config.tick_rate_ms.clamp(20, 1000));

            enable_raw_mode()?;
            let mut stdout = io::stdout();
            execute!(stdout, EnterAlternateScreen)?;
            let backend = CrosstermBackend::new(stdout);
            let mut terminal = Terminal::new(backend)?;

            let result = start_tui(&mut terminal, &mut app, tick_rate);

            disable_raw_mode()?;
            execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
            terminal.show_cursor()?;

            result
        }
    }
}

fn start_tui<B: Backend, S: KvStore, C: Clock>(
    terminal: &mut Terminal<B>,
    app: &mut App<S, C>,
    tick_rate: Duration,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::new(tick_rate));
    let mut metronome = Metronome::every_second(Instant::now());

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        let event = runner.step();
        for _ in 0..metronome.due(Instant::now()) {
            app.on_second();
        }

        match event {
            AppEvent::Key(key) => {
                if app.on_key(key) == Control::Quit {
                    break;
                }
            }
            AppEvent::Resize | AppEvent::Wake => {}
        }
    }

    Ok(())
}

fn print_list<W: Write>(catalog: &Catalog, out: &mut W) -> Result<(), Box<dyn Error>> {
    for def in catalog.list() {
        writeln!(
            out,
            "{:<16} {:<24} {:>2} exercises {:>3} sets {:>9}  ~{}",
            def.id,
            def.name,
            def.exercises.len(),
            def.total_sets(),
            format_volume(def.planned_volume_kg()),
            format_minutes(def.estimated_duration_secs() as u64),
        )?;
    }
    Ok(())
}

fn print_config<W: Write>(
    store: &FileConfigStore,
    config: &Config,
    init: bool,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    if init {
        store.save(config)?;
        writeln!(out, "wrote {}", store.path().display())?;
    } else {
        writeln!(out, "# {}", store.path().display())?;
    }
    writeln!(out, "{}", serde_json::to_string_pretty(config)?)?;
    Ok(())
}

fn print_status<W: Write>(
    catalog: &Catalog,
    workout: &str,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let definition = catalog.fetch(workout)?;
    let progress = progress_store();
    let week = progress.current_week();

    let Some(snapshot) = progress.try_load(workout)? else {
        writeln!(out, "{workout}: no saved progress for {week}")?;
        return Ok(());
    };

    let ago = (SystemClock.now() - snapshot.last_updated).num_seconds().max(0) as u64;
    let when = HumanTime::from(Duration::from_secs(ago)).to_text_en(Accuracy::Rough, Tense::Past);

    if snapshot.completed {
        writeln!(out, "{workout}: finished for {week} (saved {when})")?;
        return Ok(());
    }

    let exercise = definition.exercises.get(snapshot.exercise_index);
    writeln!(
        out,
        "{workout}: {week}, exercise {}/{} {}, set {}/{}, completed sets [{}] (saved {when})",
        snapshot.exercise_index + 1,
        definition.exercises.len(),
        exercise.map(|e| e.name.as_str()).unwrap_or("?"),
        snapshot.current_set,
        exercise.map(|e| e.sets).unwrap_or(0),
        snapshot.completed_sets.iter().join(", "),
    )?;
    Ok(())
}

fn print_history<W: Write>(db: &HistoryDb, limit: usize, out: &mut W) -> Result<(), Box<dyn Error>> {
    let week = iso_week_label(SystemClock.now().date_naive());
    let recent = db.recent(limit)?;
    if recent.is_empty() {
        writeln!(out, "no finished workouts yet")?;
    }
    for c in &recent {
        writeln!(
            out,
            "{}  {:<16} {:<24} {:>7}  {:>3} sets{}",
            c.finished_at.format("%Y-%m-%d %H:%M"),
            c.workout_id,
            c.workout_name,
            format_clock(c.elapsed_secs() as u64),
            c.sets_completed,
            if c.exercises_skipped > 0 {
                format!("  ({} skipped)", c.exercises_skipped)
            } else {
                String::new()
            },
        )?;
    }
    writeln!(
        out,
        "this week ({week}): {} workout(s), streak: {} week(s)",
        db.completions_in_week(&week)?,
        db.weekly_streak(&week)?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use setwise::{
        clock::FixedClock,
        store::MemoryKvStore,
        workout::{ExerciseDefinition, WorkoutDefinition},
    };

    fn exercise(id: &str, sets: u32, rest_secs: u32) -> ExerciseDefinition {
        ExerciseDefinition {
            id: id.to_string(),
            name: id.to_uppercase(),
            muscle: "Test".to_string(),
            sets,
            reps: 8,
            load_kg: Some(20.0),
            rest_secs,
            video_url: None,
            instructions: None,
        }
    }

    fn app(kv: &MemoryKvStore, history: Option<HistoryDb>) -> App<MemoryKvStore, FixedClock> {
        let def = WorkoutDefinition {
            id: "w".to_string(),
            name: "W".to_string(),
            description: None,
            exercises: vec![exercise("a", 2, 30), exercise("b", 1, 0)],
        };
        let clock = FixedClock::new(Local.with_ymd_and_hms(2024, 3, 6, 18, 0, 0).unwrap());
        let session = WorkoutSession::new(def, ProgressStore::new(kv.clone(), clock)).unwrap();
        App::new(session, history)
    }

    fn press(app: &mut App<MemoryKvStore, FixedClock>, code: KeyCode) -> Control {
        app.on_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_cli_workout_shorthand() {
        let cli = Cli::parse_from(["setwise", "push-day"]);
        assert_eq!(
            cli.resolved_command(),
            Command::Run {
                workout: "push-day".to_string()
            }
        );
    }

    #[test]
    fn test_cli_defaults_to_list() {
        let cli = Cli::parse_from(["setwise"]);
        assert_eq!(cli.resolved_command(), Command::List);
    }

    #[test]
    fn test_cli_subcommands() {
        let cli = Cli::parse_from(["setwise", "status", "leg-day"]);
        assert_eq!(
            cli.resolved_command(),
            Command::Status {
                workout: "leg-day".to_string()
            }
        );

        let cli = Cli::parse_from(["setwise", "history", "-n", "3", "--csv"]);
        assert_eq!(
            cli.resolved_command(),
            Command::History {
                limit: 3,
                csv: true,
                clear: false
            }
        );

        let cli = Cli::parse_from(["setwise", "--workouts-dir", "/tmp/w", "list"]);
        assert_eq!(cli.workouts_dir, Some(PathBuf::from("/tmp/w")));
        assert_eq!(cli.resolved_command(), Command::List);
    }

    #[test]
    fn test_space_drives_the_session() {
        let kv = MemoryKvStore::new();
        let mut app = app(&kv, None);

        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.session.running_state(), RunningState::Active);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.running_state(), RunningState::Resting);
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.session.running_state(), RunningState::Active);
        assert_eq!(app.session.state().current_set, 2);
    }

    #[test]
    fn test_pause_key_toggles() {
        let kv = MemoryKvStore::new();
        let mut app = app(&kv, None);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char(' '));

        press(&mut app, KeyCode::Char('p'));
        assert_eq!(app.session.running_state(), RunningState::RestingPaused);
        press(&mut app, KeyCode::Char('p'));
        assert_eq!(app.session.running_state(), RunningState::Resting);
    }

    #[test]
    fn test_rest_runs_out_on_seconds() {
        let kv = MemoryKvStore::new();
        let mut app = app(&kv, None);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char(' '));
        for _ in 0..30 {
            app.on_second();
        }
        assert_eq!(app.session.running_state(), RunningState::Active);
    }

    #[test]
    fn test_finishing_records_history_once() {
        let kv = MemoryKvStore::new();
        let mut app = app(&kv, Some(HistoryDb::open_in_memory().unwrap()));

        for _ in 0..2 {
            press(&mut app, KeyCode::Char(' ')); // start / complete
            press(&mut app, KeyCode::Char(' ')); // complete / skip rest
        }
        press(&mut app, KeyCode::Char(' ')); // skip the zero-second rest
        press(&mut app, KeyCode::Char(' ')); // last set
        assert!(app.session.is_finished());
        assert_eq!(app.state, AppState::Summary);
        assert!(app.recorded);
        assert_eq!(app.week_count, Some(1));
        assert_eq!(app.streak, Some(1));

        press(&mut app, KeyCode::Char(' '));
        let db = app.history.as_ref().unwrap();
        assert_eq!(db.recent(10).unwrap().len(), 1);
    }

    #[test]
    fn test_reset_key_returns_to_session() {
        let kv = MemoryKvStore::new();
        let mut app = app(&kv, None);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.session.running_state(), RunningState::Idle);
        assert_eq!(app.state, AppState::Session);
        assert!(kv.is_empty());
    }

    #[test]
    fn test_help_and_quit() {
        let kv = MemoryKvStore::new();
        let mut app = app(&kv, None);
        assert_eq!(press(&mut app, KeyCode::Char('?')), Control::Continue);
        assert_eq!(app.state, AppState::Help);
        // any key leaves help without acting on the session
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.state, AppState::Session);
        assert_eq!(app.session.running_state(), RunningState::Idle);

        assert_eq!(press(&mut app, KeyCode::Char('q')), Control::Quit);
        assert_eq!(press(&mut app, KeyCode::Esc), Control::Quit);
        assert_eq!(
            app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Control::Quit
        );
    }

    #[test]
    fn test_print_list_includes_builtins() {
        let mut out = Vec::new();
        print_list(&Catalog::builtin(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("core-circuit"));

        let push = Catalog::builtin().fetch("push-day").unwrap();
        let line = text.lines().find(|l| l.starts_with("push-day")).unwrap();
        assert!(line.contains(&format_volume(push.planned_volume_kg())), "{line}");
    }

    #[test]
    fn test_print_config_init_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let config = Config {
            tick_rate_ms: 100,
            ..Config::default()
        };

        let mut out = Vec::new();
        print_config(&store, &config, false, &mut out).unwrap();
        assert!(!store.path().exists());
        assert!(String::from_utf8(out).unwrap().contains("\"tick_rate_ms\": 100"));

        let mut out = Vec::new();
        print_config(&store, &config, true, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("wrote "));
        assert_eq!(store.load(), config);
    }

    #[test]
    fn test_cli_history_clear_conflicts_with_csv() {
        let cli = Cli::parse_from(["setwise", "history", "--clear"]);
        assert_eq!(
            cli.resolved_command(),
            Command::History {
                limit: 10,
                csv: false,
                clear: true
            }
        );
        assert!(Cli::try_parse_from(["setwise", "history", "--clear", "--csv"]).is_err());
    }
}
