// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! This module contains the implementation of the `microstates` binary.

use clap::Parser;
use colored::Colorize;
use microstates::{input::Job, MICROSTATES_VERSION};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "Cluster molecular dynamics trajectories into microstates and assign frames to them."
)]
pub struct Args {
    #[arg(
        help = "Job yaml file",
        long_help = "Job yaml file specifying the clustering or assignment run."
    )]
    pub job: String,

    #[arg(
        short = 's',
        long = "silent",
        help = "Only print errors",
        default_value_t = false
    )]
    pub silent: bool,

    #[arg(
        long = "overwrite",
        help = "Overwrite existing output files",
        long_help = "Overwrite existing output files instead of backing them up.",
        default_value_t = false
    )]
    pub overwrite: bool,
}

pub(crate) fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    if args.silent {
        colog::basic_builder()
            .filter(None, log::LevelFilter::Error)
            .init();
    } else {
        colog::init();
        let header = format!(">>> MICROSTATES v{} <<<", MICROSTATES_VERSION).bold();
        println!("\n{}\n", header);
    }

    let result = load_and_run(&args);

    if let Err(e) = &result {
        log::error!("{}", e);
    }

    if !args.silent {
        match &result {
            Ok(_) => {
                let prefix = format!(
                    "{}{}{}",
                    "[".to_string().blue().bold(),
                    "✔".to_string().bright_green().bold(),
                    "]".to_string().blue().bold()
                );
                let message = "JOB COMPLETED".to_string().bright_green().bold();
                println!("{} {}", prefix, message);
            }
            Err(_) => {
                let prefix = format!(
                    "{}{}{}",
                    "[".to_string().blue().bold(),
                    "✖".to_string().red().bold(),
                    "]".to_string().blue().bold()
                );
                let message = "JOB FAILED".to_string().red().bold();
                println!("{} {}", prefix, message);
            }
        }
    }

    result
}

fn load_and_run(args: &Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut job = Job::from_file(&args.job)?;
    log::info!("Read job file '{}'.", args.job);

    if args.overwrite {
        job.set_overwrite();
    }

    job.run()
}
