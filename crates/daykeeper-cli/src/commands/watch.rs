use daykeeper_core::{feed, Config, Database};

/// Stream change feed events as JSON lines until interrupted.
pub fn run(interval: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    let user = config.ensure_user_id()?;
    if let Some(secs) = interval {
        config.feed.poll_interval_secs = secs;
    }
    let db = Database::open()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(feed::watch(&db, user, &config.feed, |event| {
        match serde_json::to_string(event) {
            Ok(line) => {
                println!("{line}");
                true
            }
            Err(e) => {
                eprintln!("error: {e}");
                false
            }
        }
    }))?;
    Ok(())
}
