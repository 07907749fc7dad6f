// src/bin/preforkd.rs

fn main() {
    if let Err(err) = prefork_cli::run() {
        eprintln!("preforkd: {err:#}");
        std::process::exit(1);
    }
}
