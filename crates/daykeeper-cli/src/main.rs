use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "daykeeper-cli", version, about = "Daykeeper CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Habit management
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Accountability partner management
    Partner {
        #[command(subcommand)]
        action: commands::partner::PartnerAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Watch the accountability change feed
    Watch {
        /// Poll interval in seconds (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Habit { action } => commands::habit::run(action),
        Commands::Partner { action } => commands::partner::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Watch { interval } => commands::watch::run(interval),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
