use std::process::ExitCode;

fn main() -> ExitCode {
    magalia_cli::run()
}
