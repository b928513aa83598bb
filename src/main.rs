use std::path::PathBuf;

use clap::Parser;
use log::{debug, warn};
use snafu::ErrorCompat;

mod args;
mod delphi;

use crate::delphi::config_reader::Settings;
use crate::delphi::{ConsolidationOutcome, DelphiError, DelphiResult};
use args::{Args, Command};
use delphi_review::CommentPolicy;

fn run(args: &Args) -> DelphiResult<()> {
    let mut settings = Settings::load(args.config.as_deref())?;
    debug!("settings: {:?}", settings);
    match &args.command {
        Command::Blocks { catalog_dir } => {
            if let Some(d) = catalog_dir {
                settings.catalog_dir = PathBuf::from(d);
            }
            let listing = delphi::run_blocks(&settings)?;
            if listing.is_empty() {
                println!("No block catalog in {}", settings.catalog_dir.display());
            }
            for block in listing {
                match block.items {
                    Ok(n) => println!("{}\t{} items\t{}", block.block_id, n, block.path.display()),
                    Err(e) => println!("{}\tunreadable: {}", block.block_id, e),
                }
            }
        }
        Command::Submit {
            block,
            answers,
            catalog_dir,
            out_dir,
            strict,
        } => {
            if let Some(d) = catalog_dir {
                settings.catalog_dir = PathBuf::from(d);
            }
            if let Some(d) = out_dir {
                settings.output_dir = PathBuf::from(d);
            }
            if *strict {
                settings.policy = CommentPolicy::STRICT;
            }
            let now = chrono::Local::now().naive_local();
            let outcome = delphi::run_submit(&settings, block, answers, now)?;
            println!("Submission saved to {}", outcome.path.display());
            if let Some(w) = outcome.archive_warning {
                println!("Warning: {}", w);
            }
        }
        Command::Consolidate {
            out_dir,
            pattern,
            vote_column,
            reference,
        } => {
            if let Some(d) = out_dir {
                settings.output_dir = PathBuf::from(d);
            }
            if let Some(p) = pattern {
                settings.submission_pattern = p.clone();
            }
            if vote_column.is_some() {
                settings.vote_column = vote_column.clone();
            }
            match delphi::run_consolidation(&settings, reference.as_deref())? {
                ConsolidationOutcome::NoInputFiles => println!(
                    "No file matching {} in {}",
                    settings.submission_pattern,
                    settings.output_dir.display()
                ),
                ConsolidationOutcome::NothingReadable(skipped) => {
                    println!("None of the {} submission files could be read:", skipped.len());
                    for s in skipped {
                        println!("  {}: {}", s.path.display(), s.reason);
                    }
                }
                ConsolidationOutcome::Written {
                    artifacts,
                    consolidation,
                } => {
                    for s in consolidation.skipped.iter() {
                        println!("Skipped {}: {}", s.path.display(), s.reason);
                    }
                    println!(
                        "{} responses from {} files, votes in column {}",
                        consolidation.combined.len(),
                        consolidation.files.len(),
                        consolidation.vote_column
                    );
                    for share in consolidation.summary.votes.iter() {
                        println!("{:>8} {:>7.2}% {}", share.count, share.percent, share.vote);
                    }
                    for p in artifacts {
                        println!("Wrote {}", p.display());
                    }
                }
            }
        }
    }
    Ok(())
}

fn report(e: &DelphiError) {
    warn!("Error occured {:?}", e);
    eprintln!("An error occured {}", e);
    if let DelphiError::SubmissionRejected { violations } = e {
        for v in violations {
            eprintln!("  - {}", v);
        }
    }
    if let Some(bt) = ErrorCompat::backtrace(e) {
        eprintln!("trace: {}", bt);
    }
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    debug!("args: {:?}", args);

    if let Err(e) = run(&args) {
        report(&e);
        std::process::exit(1);
    }
}
