use std::process::ExitCode;

fn main() -> ExitCode {
    pitchwatch_cli::run()
}
