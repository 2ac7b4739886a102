//! Thin entrypoint that delegates to the library for CLI execution.

fn main() {
    let exit_code = levin_cli::run();
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
