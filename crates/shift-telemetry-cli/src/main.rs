use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = shift_telemetry_cli::Cli::parse();
    shift_telemetry_cli::run_cli(cli)
}
