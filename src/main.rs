use clap::{Parser, Subcommand};
use std::path::PathBuf;
use upload_prep::{config, output, prepare::Preparer, process};

fn version_string() -> &'static str {
    let on_tag = env!("UPLOAD_PREP_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("UPLOAD_PREP_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "upload-prep")]
#[command(about = "Shrink images to fit an upload budget")]
#[command(long_about = "\
Shrink images to fit an upload budget

Each file is checked against a byte budget and a maximum pixel dimension.
Files that already fit are passed through untouched. Oversized JPEG, PNG,
WebP and GIF images are downscaled and re-encoded until they fit; other
images are passed through and flagged when over budget.

Limits (defaults):
  budget_bytes   3 MB     (UPLOAD_PREP_BUDGET_BYTES)
  max_dimension  1600 px  (UPLOAD_PREP_MAX_DIMENSION)

Run 'upload-prep gen-config' to generate a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (TOML). Stock defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prepare files for upload and write the accepted payloads
    Prepare {
        /// Files or directories to prepare
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output directory for accepted payloads
        #[arg(long, default_value = "prepared")]
        output: PathBuf,

        /// Print a JSON report instead of progress lines
        #[arg(long)]
        json: bool,

        /// Run the pipeline but write nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Classify files against the limits without decoding them
    Check {
        /// Files or directories to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Prepare {
            paths,
            output: output_dir,
            json,
            dry_run,
        } => {
            let config = config::load_config(cli.config.as_deref(), std::env::vars())?;
            init_thread_pool(&config.processing);
            let preparer = Preparer::new(config.toolkit(), config.prepare_settings());
            let options = process::ProcessOptions {
                field_name: config.submission.field_name.clone(),
                output_dir: (!dry_run).then_some(output_dir),
            };
            let inputs = process::collect_inputs(&paths)?;

            let reports = if json {
                process::process_all(&preparer, &inputs, &options, None)?
            } else {
                let (tx, rx) = std::sync::mpsc::channel();
                let printer = std::thread::spawn(move || {
                    for event in rx {
                        for line in output::format_process_event(&event) {
                            println!("{}", line);
                        }
                    }
                });
                let reports = process::process_all(&preparer, &inputs, &options, Some(tx))?;
                printer.join().ok();
                println!();
                println!("{}", output::format_summary(&reports));
                reports
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
            if reports.iter().any(process::FileReport::is_blocked) {
                std::process::exit(1);
            }
        }
        Command::Check { paths, json } => {
            let config = config::load_config(cli.config.as_deref(), std::env::vars())?;
            let settings = config.prepare_settings();
            let entries = process::collect_inputs(&paths)?
                .iter()
                .map(|path| process::check_file(path, &settings))
                .collect::<Result<Vec<_>, _>>()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                output::print_check(&entries);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
