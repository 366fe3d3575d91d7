//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = run() {
        eprintln!("roadnet: {err}");
        std::process::exit(1);
    }
}

fn run() -> eyre::Result<()> {
    roadnet_cli::run()?;
    Ok(())
}
