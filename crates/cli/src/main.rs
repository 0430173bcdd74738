use std::process::ExitCode;

fn main() -> ExitCode {
    escalade_cli::run()
}
