use std::process;

fn main() {
    if let Err(err) = mirador::app::run() {
        eprintln!("fatal: {err}");
        process::exit(1);
    }
}
