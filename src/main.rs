use clap::Parser;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use netlab::orchestrator::Orchestrator;
use netlab::scenario::load_scenario;

/// Virtual network topology builder: replays a lab scenario and renders
/// per-device startup configurations.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario YAML file
    #[arg(short, long)]
    scenario: PathBuf,

    /// Output directory for device configs and the lease snapshot
    #[arg(short, long, default_value = "netlab_output")]
    output: PathBuf,

    /// Also write per-device CLI transcripts
    #[arg(long)]
    transcript: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting netlab");
    info!("Scenario file: {:?}", args.scenario);
    info!("Output directory: {:?}", args.output);

    let scenario = load_scenario(&args.scenario)?;

    let mut orchestrator = Orchestrator::new();
    orchestrator.run(&scenario);
    orchestrator.write_outputs(&args.output, args.transcript)?;

    info!("Scenario completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["netlab", "--scenario", "lab.yaml"]);

        assert_eq!(args.scenario, PathBuf::from("lab.yaml"));
        assert_eq!(args.output, PathBuf::from("netlab_output"));
        assert!(!args.transcript);
    }

    #[test]
    fn test_transcript_flag() {
        let args = Args::parse_from([
            "netlab",
            "--scenario",
            "lab.yaml",
            "--output",
            "out",
            "--transcript",
        ]);

        assert_eq!(args.output, PathBuf::from("out"));
        assert!(args.transcript);
    }
}
