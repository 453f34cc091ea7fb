use std::path::{Path, PathBuf};

use layerforge::config::{Config, ModelEntry};
use layerforge::descriptor::ModelDescriptor;
use layerforge::layer::{BuiltProcess, LayerBuilder};
use layerforge::packager::{self, PackReport};
use layerforge::utils;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "layerforge",
    about = "Assemble Lambda handlers from marked Python sources and package ONNX models for Triton",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// TOML configuration file (kebab-case keys)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(ClapArgs, Debug, Default)]
struct Overrides {
    /// Template file containing the placeholder markers
    #[arg(long)]
    template: Option<PathBuf>,
    /// Typing preamble file
    #[arg(long)]
    typing: Option<PathBuf>,
    /// Destination directory the staged output is merged into
    #[arg(long)]
    output: Option<PathBuf>,
    /// Skip the tar archive of the model repository
    #[arg(long, default_value_t = false)]
    no_archive: bool,
    /// Keep the staging directory instead of removing it
    #[arg(long, default_value_t = false)]
    keep_temp: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble one handler per process directory
    Assemble {
        /// Source root holding process directories and the pipeline file
        #[arg(long, default_value = "src")]
        src: PathBuf,
        /// Treat --src itself as the only process
        #[arg(long, default_value_t = false)]
        single: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Build a Triton model repository from ONNX artifacts
    Package {
        /// Directory scanned for *.onnx files (defaults to [[models]] from config)
        #[arg(long)]
        models_dir: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the descriptor for one model without packaging it
    Describe {
        /// Path to an ONNX model
        model: PathBuf,
    },
    /// Assemble handlers, then package models when enabled
    Run {
        #[arg(long, default_value = "src")]
        src: PathBuf,
        #[arg(long, default_value_t = false)]
        single: bool,
        #[arg(long)]
        models_dir: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let base = match path {
        Some(p) => Config::from_file(p)?,
        None => Config::default(),
    };
    let config = Config {
        template_file: overrides.template.clone().unwrap_or(base.template_file.clone()),
        typing_file: overrides.typing.clone().unwrap_or(base.typing_file.clone()),
        output_destination_directory: overrides
            .output
            .clone()
            .unwrap_or(base.output_destination_directory.clone()),
        run_archive_step: base.run_archive_step && !overrides.no_archive,
        remove_temp_files: base.remove_temp_files && !overrides.keep_temp,
        ..base
    };
    config.validate()?;
    Ok(config)
}

fn resolve_models(models_dir: Option<&Path>, config: &Config) -> Result<Vec<ModelEntry>> {
    match models_dir {
        Some(dir) => packager::discover_models(dir),
        None => Ok(config.models.clone()),
    }
}

fn assemble(config: &Config, src: &Path, single: bool, staging: &Path) -> Result<Vec<BuiltProcess>> {
    let builder = LayerBuilder::new(config);
    if single {
        Ok(vec![builder.build_single(src, staging)?])
    } else {
        builder.build_each_directory(src, staging)
    }
}

fn summary_rows(built: &[BuiltProcess], report: Option<&PackReport>) -> Vec<utils::SummaryRow> {
    let mut rows: Vec<utils::SummaryRow> = built
        .iter()
        .map(|b| utils::SummaryRow {
            item: b.process.clone(),
            kind: "process",
            status: format!(
                "{} imports, {} class lines, {} pipeline lines, {} inputs",
                b.imports, b.class_lines, b.pipeline_lines, b.inputs
            ),
        })
        .collect();
    if let Some(report) = report {
        rows.extend(report.packaged.iter().map(|e| utils::SummaryRow {
            item: e.model_name.clone(),
            kind: "model",
            status: format!("packaged (version {})", e.version),
        }));
        rows.extend(report.failed.iter().map(|(name, err)| utils::SummaryRow {
            item: name.clone(),
            kind: "model",
            status: format!("skipped: {err}"),
        }));
    }
    rows
}

/// Run `work` inside a staging directory, then merge the result into the
/// configured destination. The staging directory honours
/// `remove-temp-files` whether or not the work succeeds.
fn staged<T>(config: &Config, work: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    let staging = utils::create_staging_dir()?;
    let result = work(staging.path()).and_then(|value| {
        let destination = &config.output_destination_directory;
        info!(from = %staging.path().display(), to = %destination.display(), "merging output");
        utils::merge_into(staging.path(), destination)?;
        Ok(value)
    });
    utils::finish_staging(staging, config.remove_temp_files);
    result
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Assemble {
            src,
            single,
            overrides,
        } => {
            let config = load_config(args.config.as_deref(), &overrides)?;
            info!(src = %src.display(), single, "starting assemble");
            let built = staged(&config, |staging| assemble(&config, &src, single, staging))?;
            utils::print_summary(&summary_rows(&built, None), &config.output_destination_directory);
        }
        Commands::Package {
            models_dir,
            overrides,
        } => {
            let config = load_config(args.config.as_deref(), &overrides)?;
            let models = resolve_models(models_dir.as_deref(), &config)?;
            info!(models = models.len(), "starting package");
            let report = staged(&config, |staging| packager::pack_models(&models, staging, &config))?;
            utils::print_summary(
                &summary_rows(&[], Some(&report)),
                &config.output_destination_directory,
            );
        }
        Commands::Describe { model } => {
            let config = load_config(args.config.as_deref(), &Overrides::default())?;
            let descriptor = ModelDescriptor::from_model_file(&model, &config)?;
            print!("{}", descriptor.render());
        }
        Commands::Run {
            src,
            single,
            models_dir,
            overrides,
        } => {
            let config = load_config(args.config.as_deref(), &overrides)?;
            info!(src = %src.display(), single, package_models = config.package_models, "starting run");
            let (built, report) = staged(&config, |staging| {
                let built = assemble(&config, &src, single, staging)?;
                let report = if config.package_models {
                    let models = resolve_models(models_dir.as_deref(), &config)?;
                    Some(packager::pack_models(&models, staging, &config)?)
                } else {
                    None
                };
                Ok((built, report))
            })?;
            utils::print_summary(
                &summary_rows(&built, report.as_ref()),
                &config.output_destination_directory,
            );
        }
    }

    Ok(())
}
