fn main() {
    if let Err(err) = wordlens_lib::run() {
        eprintln!("wordlens: {:#}", err);
        std::process::exit(1);
    }
}
