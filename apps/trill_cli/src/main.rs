fn main() {
    if let Err(e) = trill_cli::run_cli() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
