use tickwork_core::daemons;
use tickwork_core::Config;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let json = serde_json::to_string_pretty(&daemons::describe(&config))?;
    println!("{json}");
    Ok(())
}
