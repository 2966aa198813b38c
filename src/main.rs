use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use bdd2yolo::aggregate::{aggregate, AggregateParams};
use bdd2yolo::config::{Args, Command};
use bdd2yolo::dataset::{process_dataset, ConvertParams};
use bdd2yolo::materialize::{write_label_files, TransferMode};
use bdd2yolo::organize::{organize_by_time_of_day, split_val_test};
use bdd2yolo::utils::seeded_rng;
use bdd2yolo::{store, CategoryMap, DatasetResult};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> DatasetResult<()> {
    let categories = CategoryMap::bdd100k()?;

    match args.command {
        Command::Convert(c) => {
            info!("Starting the conversion process...");
            let mut rng = seeded_rng(c.seed);
            process_dataset(
                &ConvertParams {
                    store: &c.store,
                    images_root: &c.images,
                    output: &c.output,
                    train_ratio: c.train_ratio,
                    val_ratio: c.val_ratio,
                },
                &categories,
                &mut rng,
            )?;
        }
        Command::Labels(c) => {
            let records = store::load(&c.store)?;
            let report = write_label_files(&records, &c.output, &categories)?;
            report.print_summary("Labels");
        }
        Command::Organize(c) => {
            let records = store::load(&c.store)?;
            let transfer = if c.move_files {
                TransferMode::Move
            } else {
                TransferMode::Copy
            };
            let reports =
                organize_by_time_of_day(&records, &c.images, &c.output, &categories, transfer)?;
            let missing: usize = reports.values().map(|r| r.missing).sum();
            info!("{} images missing", missing);
        }
        Command::ValTest(c) => {
            let records = store::load(&c.store)?;
            let mut rng = seeded_rng(c.seed);
            split_val_test(
                &records,
                &c.images,
                &c.output,
                c.test_ratio,
                &categories,
                &mut rng,
            )?;
        }
        Command::Aggregate(c) => {
            let sources = c.sources()?;
            let mut rng = seeded_rng(c.seed);
            let report = aggregate(
                &AggregateParams {
                    sources: &sources,
                    val_images: &c.val_images,
                    val_labels: &c.val_labels,
                    dest: &c.output,
                    policy: c.policy(),
                },
                &categories,
                &mut rng,
            )?;
            info!(
                "Aggregated {} training pairs and {} validation files into {}",
                report.train_images,
                report.val_files,
                c.output.display()
            );
        }
    }
    Ok(())
}
