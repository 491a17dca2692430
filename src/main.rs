fn main() {
    if let Err(err) = juggler::cli::main() {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
}
