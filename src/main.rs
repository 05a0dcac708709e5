use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use ki::cli::{Cli, Command};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> ki::Result<()> {
    match command {
        Command::Clone {
            collection,
            directory,
            profile,
        } => {
            let collection_path = match profile {
                Some(profile) => ki::profile::collection_path_for_profile(&profile)?,
                None => PathBuf::from(&collection),
            };
            let target = directory.unwrap_or_else(|| default_clone_target(&collection_path));
            let report = ki::clone::clone(&collection_path, &target)?;
            println!(
                "cloned {} notes into {}",
                report.notes_written,
                target.display()
            );
            for warning in &report.warnings {
                warning.print();
            }
            Ok(())
        }
        Command::Pull { directory } => {
            let root = resolve_root(directory)?;
            let report = ki::pull::pull(&root)?;
            match report.outcome {
                ki::types::PullOutcome::UpToDate => {}
                ki::types::PullOutcome::Merged => println!("pull complete"),
                ki::types::PullOutcome::ConflictsLeft => {
                    println!(
                        "pull left {} file(s) with conflicts to resolve manually",
                        report.conflicted_paths.len()
                    );
                    for path in &report.conflicted_paths {
                        println!("  {}", path.display());
                    }
                }
            }
            Ok(())
        }
        Command::Push { directory } => {
            let root = resolve_root(directory)?;
            let report = ki::push::push(&root)?;
            match report.outcome {
                ki::types::PushOutcome::UpToDate => {}
                ki::types::PushOutcome::NonTrivial => println!("push complete"),
            }
            Ok(())
        }
    }
}

fn default_clone_target(collection_path: &Path) -> PathBuf {
    PathBuf::from(
        collection_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "ki-collection".to_string()),
    )
}

fn resolve_root(directory: Option<PathBuf>) -> ki::Result<PathBuf> {
    let start = directory.unwrap_or(std::env::current_dir()?);
    ki::paths::find_ki_root(&start)
}
