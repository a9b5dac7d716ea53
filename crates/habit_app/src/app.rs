use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use habit_core::{
    format_date, parse_local_date, DayOfWeek, Habit, HabitError, HabitService, HistoryPeriod,
    DEFAULT_STREAK_HORIZON_DAYS,
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) database_path: PathBuf,
    pub(crate) streak_horizon_days: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let explicit = lookup("HABITS_DB_PATH")
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty());
        if let Some(path) = explicit {
            config.database_path = PathBuf::from(path);
        } else if let Some(home) = lookup("HOME").filter(|home| !home.trim().is_empty()) {
            config.database_path = PathBuf::from(home).join(".habits").join("habits.sqlite");
        }
        if let Some(horizon) = lookup("HABITS_STREAK_HORIZON_DAYS") {
            if let Ok(value) = horizon.trim().parse::<u32>() {
                if value > 0 {
                    config.streak_horizon_days = value;
                }
            }
        }
        Ok(config)
    }

    pub(crate) fn apply_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.database {
            self.database_path = path.clone();
        }
        if let Some(days) = cli.streak_horizon_days {
            if days > 0 {
                self.streak_horizon_days = days;
            }
        }
    }

    fn open_service(&self) -> Result<HabitService> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("unable to create data directory {}", parent.display())
                })?;
            }
        }
        info!(path = %self.database_path.display(), "opening habit database");
        HabitService::builder()
            .database_path(&self.database_path)
            .streak_horizon_days(self.streak_horizon_days)
            .build()
            .context("failed to initialize habit service")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("habits.sqlite"),
            streak_horizon_days: DEFAULT_STREAK_HORIZON_DAYS,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "habits", about = "Track weekly habits, completions and streaks")]
pub struct Cli {
    /// SQLite database file (overrides HABITS_DB_PATH)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Days of history considered for streaks
    #[arg(long, global = true)]
    pub streak_horizon_days: Option<u32>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Habits due today and whether they are done
    Today,
    /// List habits
    List {
        /// Include deleted habits
        #[arg(long)]
        all: bool,
    },
    /// Create a habit
    Add {
        name: String,
        #[arg(long, value_delimiter = ',', default_values = ["mon", "tue", "wed", "thu", "fri"])]
        days: Vec<DayOfWeek>,
    },
    /// Rename or reschedule a habit
    Edit {
        id: i64,
        name: String,
        #[arg(long, value_delimiter = ',', required = true)]
        days: Vec<DayOfWeek>,
    },
    /// Delete a habit, keeping its history
    Delete { id: i64 },
    /// Mark or unmark a habit as done
    Toggle {
        id: i64,
        /// Day to toggle, defaults to today
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Completion rate over a period
    Stats(RangeArgs),
    /// Per-day breakdown over a period
    History(RangeArgs),
    /// Current and longest streaks
    Streaks,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PeriodArg {
    Week,
    Month,
    Year,
}

#[derive(Debug, Args)]
pub struct RangeArgs {
    #[arg(long, value_enum, default_value = "week")]
    pub period: PeriodArg,
    /// Custom range start, requires --to
    #[arg(long, value_parser = parse_date, requires = "to")]
    pub from: Option<NaiveDate>,
    /// Custom range end, requires --from
    #[arg(long, value_parser = parse_date, requires = "from")]
    pub to: Option<NaiveDate>,
}

impl RangeArgs {
    fn period(&self) -> HistoryPeriod {
        match (self.from, self.to, self.period) {
            (Some(start), Some(end), _) => HistoryPeriod::Custom { start, end },
            (_, _, PeriodArg::Week) => HistoryPeriod::Week,
            (_, _, PeriodArg::Month) => HistoryPeriod::Month,
            (_, _, PeriodArg::Year) => HistoryPeriod::Year,
        }
    }
}

fn parse_date(raw: &str) -> std::result::Result<NaiveDate, HabitError> {
    parse_local_date(raw)
}

pub fn run(mut config: AppConfig, cli: Cli) -> Result<()> {
    config.apply_cli(&cli);
    let service = config.open_service()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&service, cli.command, cli.json, &mut out)
}

#[derive(Serialize)]
struct TodayEntry<'a> {
    id: i64,
    name: &'a str,
    completed: bool,
}

#[derive(Serialize)]
struct ListEntry<'a> {
    id: i64,
    name: &'a str,
    days: String,
    deleted: bool,
}

fn emit_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub(crate) fn execute(
    service: &HabitService,
    command: Command,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    debug!(?command, "running command");
    match command {
        Command::Today => {
            let today = service.today();
            let done = service.completions_on(today)?;
            let habits = service.today_habits()?;
            let entries: Vec<TodayEntry> = habits
                .iter()
                .map(|habit| TodayEntry {
                    id: habit.id,
                    name: &habit.name,
                    completed: done.contains(&habit.id),
                })
                .collect();
            if json {
                return emit_json(out, &entries);
            }
            let completed = entries.iter().filter(|entry| entry.completed).count();
            writeln!(
                out,
                "{}: {} of {} complete",
                format_date(today),
                completed,
                entries.len()
            )?;
            if entries.is_empty() {
                writeln!(out, "No habits for today")?;
            }
            for entry in entries {
                let mark = if entry.completed { "x" } else { " " };
                writeln!(out, "[{mark}] {:>3}  {}", entry.id, entry.name)?;
            }
        }
        Command::List { all } => {
            let habits = if all {
                service.all_habits()?
            } else {
                service.active_habits()?
            };
            let entries: Vec<ListEntry> = habits.iter().map(list_entry).collect();
            if json {
                return emit_json(out, &entries);
            }
            for entry in entries {
                let suffix = if entry.deleted { " (deleted)" } else { "" };
                writeln!(out, "{:>3}  {}  {}{}", entry.id, entry.name, entry.days, suffix)?;
            }
        }
        Command::Add { name, days } => {
            let habit = service.create_habit(&name, &days)?;
            report_habit(out, json, "created", &habit)?;
        }
        Command::Edit { id, name, days } => {
            let habit = service.update_habit(id, &name, &days)?;
            report_habit(out, json, "updated", &habit)?;
        }
        Command::Delete { id } => {
            service.delete_habit(id)?;
            if json {
                return emit_json(out, &serde_json::json!({ "id": id, "deleted": true }));
            }
            writeln!(out, "deleted habit {id}")?;
        }
        Command::Toggle { id, date } => {
            let date = date.unwrap_or_else(|| service.today());
            let habit = service.habit(id)?;
            let completed = service.toggle_completion(id, date)?;
            if json {
                return emit_json(
                    out,
                    &serde_json::json!({ "id": id, "date": date, "completed": completed }),
                );
            }
            let state = if completed { "done" } else { "not done" };
            writeln!(out, "{} on {}: {}", habit.name, format_date(date), state)?;
        }
        Command::Stats(range) => {
            let (start, end) = range.period().range(service.today());
            let stats = service.completion_stats(start, end)?;
            if json {
                return emit_json(out, &stats);
            }
            writeln!(
                out,
                "{} to {}: {}% ({} / {})",
                format_date(start),
                format_date(end),
                stats.percentage,
                stats.completed,
                stats.expected
            )?;
        }
        Command::History(range) => {
            let (start, end) = range.period().range(service.today());
            let days = service.history(start, end)?;
            if json {
                return emit_json(out, &days);
            }
            if days.is_empty() {
                writeln!(out, "No history yet")?;
            }
            for day in days {
                writeln!(out, "{}  {}/{}", format_date(day.date), day.completed, day.total)?;
                for habit in day.habits {
                    let mark = if habit.completed { "x" } else { " " };
                    writeln!(out, "    [{mark}] {}", habit.name)?;
                }
            }
        }
        Command::Streaks => {
            let streaks = service.streaks()?;
            if json {
                return emit_json(out, &streaks);
            }
            writeln!(out, "current streak: {}", streaks.current)?;
            writeln!(out, "longest streak: {}", streaks.longest)?;
        }
    }
    Ok(())
}

fn list_entry(habit: &Habit) -> ListEntry<'_> {
    ListEntry {
        id: habit.id,
        name: &habit.name,
        days: habit.schedule.describe(),
        deleted: !habit.is_active(),
    }
}

fn report_habit(out: &mut impl Write, json: bool, verb: &str, habit: &Habit) -> Result<()> {
    if json {
        return emit_json(out, habit);
    }
    writeln!(
        out,
        "{verb} habit {}: {} ({})",
        habit.id,
        habit.name,
        habit.schedule.describe()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::collections::HashMap;

    fn service() -> HabitService {
        // 2024-03-13 is a Wednesday.
        HabitService::builder()
            .with_clock(|| {
                Local
                    .with_ymd_and_hms(2024, 3, 13, 12, 0, 0)
                    .earliest()
                    .unwrap()
            })
            .build()
            .unwrap()
    }

    fn run_cli(service: &HabitService, args: &[&str]) -> String {
        let cli = Cli::try_parse_from(std::iter::once("habits").chain(args.iter().copied()))
            .unwrap();
        let mut out = Vec::new();
        execute(service, cli.command, cli.json, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn config_reads_environment_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("HOME", "/home/tester"),
            ("HABITS_STREAK_HORIZON_DAYS", "90"),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(
            config.database_path,
            PathBuf::from("/home/tester/.habits/habits.sqlite")
        );
        assert_eq!(config.streak_horizon_days, 90);

        let vars: HashMap<&str, &str> = HashMap::from([
            ("HABITS_DB_PATH", "/tmp/h.sqlite"),
            ("HABITS_STREAK_HORIZON_DAYS", "0"),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/h.sqlite"));
        assert_eq!(config.streak_horizon_days, DEFAULT_STREAK_HORIZON_DAYS);
    }

    #[test]
    fn blank_database_path_falls_back_to_home() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("HOME", "/home/tester"), ("HABITS_DB_PATH", "   ")]);
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(
            config.database_path,
            PathBuf::from("/home/tester/.habits/habits.sqlite")
        );
    }

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::try_parse_from([
            "habits",
            "--database",
            "/data/x.sqlite",
            "--streak-horizon-days",
            "30",
            "streaks",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        config.apply_cli(&cli);
        assert_eq!(config.database_path, PathBuf::from("/data/x.sqlite"));
        assert_eq!(config.streak_horizon_days, 30);
    }

    #[test]
    fn add_toggle_and_today_flow() {
        let service = service();
        let created = run_cli(&service, &["add", "Stretch", "--days", "mon,wed"]);
        assert_eq!(created, "created habit 1: Stretch (Mon, Wed)\n");
        run_cli(&service, &["add", "Read"]);

        let toggled = run_cli(&service, &["toggle", "1"]);
        assert_eq!(toggled, "Stretch on 2024-03-13: done\n");

        let today = run_cli(&service, &["today"]);
        assert!(today.starts_with("2024-03-13: 1 of 2 complete"));
        assert!(today.contains("[x]   1  Stretch"));
        assert!(today.contains("[ ]   2  Read"));
    }

    #[test]
    fn rejects_bad_dates_and_days() {
        assert!(Cli::try_parse_from(["habits", "toggle", "1", "--date", "2024-3-1"]).is_err());
        assert!(Cli::try_parse_from(["habits", "add", "Run", "--days", "mon,funday"]).is_err());
        assert!(Cli::try_parse_from(["habits", "stats", "--from", "2024-03-01"]).is_err());
    }

    #[test]
    fn stats_and_streaks_as_json() {
        let service = service();
        run_cli(&service, &["add", "Walk", "--days", "wed"]);
        run_cli(&service, &["toggle", "1"]);

        let stats: serde_json::Value =
            serde_json::from_str(&run_cli(&service, &["--json", "stats"])).unwrap();
        assert_eq!(stats["completed"], 1);
        assert_eq!(stats["expected"], 1);
        assert_eq!(stats["percentage"], 100);

        let streaks: serde_json::Value =
            serde_json::from_str(&run_cli(&service, &["streaks", "--json"])).unwrap();
        assert_eq!(streaks["current"], 1);
        assert_eq!(streaks["longest"], 1);
    }

    #[test]
    fn list_marks_deleted_habits() {
        let service = service();
        run_cli(&service, &["add", "Walk", "--days", "sat,sun"]);
        run_cli(&service, &["delete", "1"]);
        assert_eq!(run_cli(&service, &["list"]), "");
        assert_eq!(
            run_cli(&service, &["list", "--all"]),
            "  1  Walk  Weekends (deleted)\n"
        );
    }
}
