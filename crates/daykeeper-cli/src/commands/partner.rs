use clap::Subcommand;
use daykeeper_core::{Config, Database};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum PartnerAction {
    /// Pair with a partner by user id
    Add {
        /// Partner user id
        partner: Uuid,
    },
    /// Unpair from a partner
    Remove {
        /// Partner user id
        partner: Uuid,
    },
    /// List active partners
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show habits partners have shared with you
    Shared {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: PartnerAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    let user = config.ensure_user_id()?;
    let db = Database::open()?;

    match action {
        PartnerAction::Add { partner } => {
            let pairing = db.pair(user, partner)?;
            println!("Paired with {} (key {})", pairing.partner, pairing.special_key);
        }
        PartnerAction::Remove { partner } => {
            db.unpair(user, partner)?;
            println!("Unpaired from {partner}");
        }
        PartnerAction::List { json } => {
            let pairings = db.partners_of(user)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&pairings)?);
            } else if pairings.is_empty() {
                println!("no partners");
            } else {
                for pairing in &pairings {
                    // partners_of only returns pairings involving the user
                    let counterpart = pairing.counterpart(user).unwrap_or(pairing.partner);
                    println!("{counterpart}  since {}", pairing.started_at.date_naive());
                }
            }
        }
        PartnerAction::Shared { json } => {
            let habits = db.habits_shared_with(user)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&habits)?);
            } else if habits.is_empty() {
                println!("no shared habits");
            } else {
                for habit in &habits {
                    println!(
                        "{:<24} owner {}  streak {}",
                        habit.name, habit.owner, habit.streak
                    );
                }
            }
        }
    }
    Ok(())
}
