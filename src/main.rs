use clap::Parser;
use scram::cli::{Cli, CliRunner};
use std::process;

fn main() {
    let cli = Cli::parse();
    let runner = CliRunner::new(&cli);

    if let Err(e) = runner.run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}
