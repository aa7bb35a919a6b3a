use anyhow::Result;
use clap::Parser;

use apiwatch::args::{Args, Command, ReportFormat};
use apiwatch::runner::{run_check, run_model_gen, run_stats};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::ModelGen(args) => {
            let summary = run_model_gen(&args)?;
            println!(
                "model written to {} ({} paths, {} rho relations, {} calls collapsed, {}/{} clients ok)",
                summary.output.display(),
                summary.paths,
                summary.rho_relations,
                summary.collapsed_calls,
                summary.clients_executed - summary.clients_failed,
                summary.clients_executed,
            );
        }
        Command::Check(args) => {
            let format = args.format;
            let report = run_check(&args)?;
            match format {
                ReportFormat::Human => print!("{}", report.render_human()),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            // Breaking paths are report content, not an error: exit 0.
        }
        Command::Stats(args) => {
            let stats = run_stats(&args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", stats.render_human());
            }
        }
    }
    Ok(())
}
