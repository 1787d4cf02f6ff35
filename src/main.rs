fn main() {
    if let Err(err) = licence_ledger::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
