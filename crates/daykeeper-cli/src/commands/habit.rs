use chrono::{Local, NaiveDate};
use clap::Subcommand;
use daykeeper_core::streak::parse_date;
use daykeeper_core::{Cadence, Config, Database, Habit};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a habit
    Add {
        /// Habit name (unique)
        name: String,
        /// Cadence in days (1 = daily, 7 = weekly)
        #[arg(long)]
        every: Option<u32>,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
        /// Optional display colour (#RRGGBB)
        #[arg(long)]
        colour: Option<String>,
    },
    /// List habits
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one habit in full
    Show {
        /// Habit name
        name: String,
    },
    /// Delete a habit
    Remove {
        /// Habit name
        name: String,
    },
    /// Mark a date as completed (defaults to today)
    Mark {
        /// Habit name
        name: String,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Unmark a date
    Unmark {
        /// Habit name
        name: String,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Show the current streak
    Streak {
        /// Habit name
        name: String,
    },
}

pub fn run(action: HabitAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    let user = config.ensure_user_id()?;
    let mut db = Database::open()?;
    let today = Local::now().date_naive();

    match action {
        HabitAction::Add {
            name,
            every,
            description,
            colour,
        } => {
            let cadence = match every {
                Some(days) => Cadence::new(days)?,
                None => Cadence::new(config.habits.default_cadence_days)?,
            };
            let mut habit = Habit::new(user, &name, cadence)?;
            habit.description = description;
            if let Some(colour) = colour {
                habit.set_colour(Some(&colour))?;
            }
            db.insert_habit(&habit)?;
            println!("Habit created: {} ({})", habit.name, habit.id);
        }
        HabitAction::List { json } => {
            let habits = db.list_habits(user)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&habits)?);
            } else if habits.is_empty() {
                println!("no habits");
            } else {
                for habit in &habits {
                    println!(
                        "{:<24} every {}d  streak {:<4} last {}",
                        habit.name,
                        habit.cadence,
                        habit.streak,
                        format_date(habit.last_completed)
                    );
                }
            }
        }
        HabitAction::Show { name } => {
            let habit = db.habit_by_name(user, &name)?;
            println!("{}", serde_json::to_string_pretty(&habit)?);
        }
        HabitAction::Remove { name } => {
            let habit = db.habit_by_name(user, &name)?;
            db.delete_habit(habit.id)?;
            println!("Habit removed: {name}");
        }
        HabitAction::Mark { name, date } => {
            let habit = db.habit_by_name(user, &name)?;
            let date = resolve_date(date, today)?;
            let updated = db.mark_completion(habit.id, date, true, today)?;
            println!(
                "{} marked for {date} (streak {})",
                updated.name, updated.streak
            );
        }
        HabitAction::Unmark { name, date } => {
            let habit = db.habit_by_name(user, &name)?;
            let date = resolve_date(date, today)?;
            let updated = db.mark_completion(habit.id, date, false, today)?;
            println!(
                "{} unmarked for {date} (streak {})",
                updated.name, updated.streak
            );
        }
        HabitAction::Streak { name } => {
            let habit = db.habit_by_name(user, &name)?;
            println!("{}", serde_json::to_string_pretty(&habit.streak_result())?);
        }
    }
    Ok(())
}

fn resolve_date(
    date: Option<String>,
    today: NaiveDate,
) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match date {
        Some(s) => Ok(parse_date(&s)?),
        None => Ok(today),
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}
