use std::process::exit;

fn main() {
    if let Err(e) = medhistory::app::run_cli() {
        eprintln!("error: {e}");
        exit(1);
    }
}
