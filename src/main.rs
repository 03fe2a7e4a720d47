//! `unotify` binary entry point.

use std::process::ExitCode;

use clap::Parser;
use unique_notify::cli_app::{self, Cli, USAGE_EXIT_CODE};
use unique_notify::logger::{self, LogFormat};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    logger::init(cli.verbose, format);

    match cli_app::run(&cli) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({"success": false, "code": e.code(), "message": e.to_string()})
                );
            } else {
                eprintln!("unotify: {e}");
            }
            ExitCode::from(USAGE_EXIT_CODE)
        }
    }
}
