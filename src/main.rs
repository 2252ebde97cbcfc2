use std::process::exit;

fn main() {
    if let Err(e) = scorecard_page::app::run_cli() {
        eprintln!("error: {e}");
        exit(1);
    }
}
