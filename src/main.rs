use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use epinlp::{FileType, Pipeline, PipelineConfig, TrainedProgram};

#[derive(Parser)]
#[command(name = "epinlp")]
#[command(about = "Text-classification pipelines for epidemiological records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline configuration and print its evaluation
    Run {
        /// Pipeline configuration (JSON)
        config: PathBuf,

        /// Export the trained program to this MessagePack file
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Print the evaluation as JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Append predicted flags to a CSV/TSV file
    Annotate {
        /// Exported program
        program: PathBuf,

        /// File to label
        input: PathBuf,

        /// Where to write the labelled copy
        output: PathBuf,

        /// Header of the new column
        #[arg(short, long, default_value = "PREDICTED_FLAG")]
        label: String,

        /// CSV or TSV
        #[arg(long, default_value = "CSV")]
        file_type: String,
    },

    /// Show an exported program and its most informative terms
    Inspect {
        /// Exported program
        program: PathBuf,

        /// Number of terms to list
        #[arg(short, long, default_value = "10")]
        top: usize,
    },

    /// Classify text typed at the prompt
    Classify {
        /// Exported program
        program: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Run { config, export, json } => run(config, export, json),
        Commands::Annotate {
            program,
            input,
            output,
            label,
            file_type,
        } => {
            let program = load(&program)?;
            let file_type: FileType = file_type.parse()?;
            let rows = program.annotate_csv(&input, &output, file_type, &label)?;
            println!("✅ Labelled {rows} rows into {}", output.display());
            Ok(())
        }
        Commands::Inspect { program, top } => {
            let program = load(&program)?;
            println!("{program}");
            let features = program.top_features(top);
            if !features.is_empty() {
                println!("Most Informative Terms (based on document frequency ratio):");
            }
            for feature in features {
                println!(
                    "{:>30} | positive: {:>5}, negative: {:>5}, ratio(p/n): {:.2}",
                    feature.term, feature.positive, feature.negative, feature.ratio
                );
            }
            Ok(())
        }
        Commands::Classify { program } => classify(&load(&program)?),
    }
}

fn load(path: &Path) -> Result<TrainedProgram> {
    println!("📦 Loading program from {}...", path.display());
    TrainedProgram::load_from_file(path).with_context(|| format!("failed to load {}", path.display()))
}

fn run(config: PathBuf, export: Option<PathBuf>, json: bool) -> Result<()> {
    let config = PipelineConfig::load(&config).with_context(|| format!("failed to read {}", config.display()))?;
    if !json {
        println!("{config}\n");
    }

    let mut created = Pipeline::new(&config)?.create()?;
    let evaluation = created.evaluate()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        println!("{evaluation}");
    }

    if let Some(path) = export {
        println!("💾 Saving program to {}", path.display());
        created.into_program().save_to_file(&path)?;
    }
    Ok(())
}

fn classify(program: &TrainedProgram) -> Result<()> {
    let fields = program.text_columns().len();
    loop {
        if fields == 1 {
            print!("Enter text to classify (or 'exit'): ");
        } else {
            print!("Enter {fields} texts separated by '|' (or 'exit'): ");
        }
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();

        if line.eq_ignore_ascii_case("exit") {
            return Ok(());
        }

        let texts: Vec<&str> = if fields == 1 {
            vec![line]
        } else {
            line.split('|').map(str::trim).collect()
        };
        if texts.len() != fields {
            eprintln!("Expected {fields} texts, got {}", texts.len());
            continue;
        }
        let flag = program.predict_single(&texts)?;
        println!("{line:?} is classified as {flag}");
    }
}
