fn main() {
    std::process::exit(ts_cli::run_cli_from_args(std::env::args_os()));
}
