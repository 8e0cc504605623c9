use std::process::ExitCode;

fn main() -> ExitCode {
    vaulta_cli::run()
}
