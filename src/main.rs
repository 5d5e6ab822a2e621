fn main() {
    if let Err(err) = lanegraph::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
