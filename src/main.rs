// src/main.rs

use std::process::ExitCode;

use taskdeck::{cli, logging, outcome_for, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("taskdeck error: {err:?}");
        return ExitCode::from(taskdeck::EXIT_FAILURE);
    }

    let outcome = match run(args).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("taskdeck error: {err}");
            outcome_for(&err)
        }
    };
    ExitCode::from(outcome.exit_code())
}
