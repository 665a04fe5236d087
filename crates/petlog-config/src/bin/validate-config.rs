//! Checks a PetLog client configuration file without starting the client.
//!
//! Exit codes: 0 valid, 1 invalid or unreadable, 2 bad usage.

use petlog_config::{ConfigError, Settings, CURRENT_CONFIG_VERSION};
use petlog_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args_os().skip(1);
    let path = match (args.next(), args.next()) {
        (None, _) => default_config_path(),
        (Some(arg), None) if arg != "-h" && arg != "--help" => PathBuf::from(arg),
        _ => {
            eprintln!("usage: validate-config [CONFIG]");
            eprintln!("  default CONFIG: {}", default_config_path().display());
            return ExitCode::from(2);
        }
    };

    match petlog_config::load_config(&path) {
        Ok(settings) => {
            println!("{}: ok (version {})", path.display(), CURRENT_CONFIG_VERSION);
            print_settings(&settings);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: invalid", path.display());
            report(&err);
            ExitCode::from(1)
        }
    }
}

fn print_settings(settings: &Settings) {
    let client = &settings.client;
    let cards = &settings.cards;
    println!("  base_url          {}", client.base_url);
    println!("  timeout           {:?}", client.timeout);
    println!("  cache_ttl         {:?}", client.cache_ttl);
    println!("  swipe_threshold   {}", cards.swipe_threshold);
    println!("  refresh_interval  {:?}", cards.refresh_interval);
}

fn report(err: &ConfigError) {
    match err {
        ConfigError::ValidationFailed { errors } => {
            for e in errors {
                eprintln!("  - {}", e);
            }
        }
        other => eprintln!("  {}", other),
    }
}
