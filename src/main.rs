//! Wavetable - Wavetable Extraction Tool

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::process;
use wavetable::config::{Args, Command, Config, ExtractArgs, GenerateArgs, MorphArgs};
use wavetable::wavetable::{generate, morph, SerializerConfig, Stack, StackSerializer};
use wavetable::wavetable::ExtractionMethod;
use wavetable::{init_logging, WavetableError, WavetableProcessor};

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        if is_validation_error(&e) {
            eprintln!("Check the command line arguments and configuration values.");
        }
        process::exit(1);
    }
}

fn is_validation_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<WavetableError>())
        .any(WavetableError::is_validation)
}

fn run(args: Args) -> Result<()> {
    if args.verbose {
        println!("{}", wavetable::get_library_info());
        println!();
    }

    let config_file = args.config_file.as_deref();
    match &args.command {
        Command::Extract(cmd) => run_extract(cmd, config_file, args.verbose),
        Command::Generate(cmd) => run_generate(cmd, config_file, args.verbose),
        Command::Morph(cmd) => run_morph(cmd, config_file, args.verbose),
        Command::InitConfig { path } => {
            Config::create_default_config(path)
                .with_context(|| format!("Failed to create config at {}", path.display()))?;
            println!("Default config written to {}", path.display());
            Ok(())
        }
    }
}

fn run_extract(args: &ExtractArgs, config_file: Option<&Path>, verbose: bool) -> Result<()> {
    let config = Config::from_extract_args(args, config_file, verbose).context("Invalid configuration")?;

    if !config.input_path.exists() {
        bail!("Input file does not exist: {}", config.input_path.display());
    }
    create_parent_dir(&config.output_path)?;

    println!("=== Wavetable Extraction ===");
    println!("Input: {}", config.input_path.display());
    println!("Output: {}", config.output_path.display());
    println!(
        "Tables: {} x {} samples ({:?})",
        config.num_tables(),
        config.table_size(),
        config.extraction.method
    );
    if config.processing.parallel {
        println!("Mode: Parallel");
    } else {
        println!("Mode: Serial");
    }
    println!("============================\n");

    let processor = WavetableProcessor::new(config.clone())?;
    let result = processor
        .process_file(&config.input_path, &config.output_path)
        .with_context(|| format!("Failed to process {}", config.input_path.display()))?;

    let metrics = &result.metrics;
    println!("=== Extraction Complete ===");
    println!("Tables: {} x {}", metrics.table_count, metrics.table_size);
    println!("Time: {:.2}s", metrics.processing_time_seconds);
    println!("RTF: {:.3}", metrics.real_time_factor);
    if config.verbose() {
        println!("Input: {:.2}s at {} Hz", metrics.input_duration_seconds, metrics.input_sample_rate);
        println!("Container rate: {} Hz", metrics.container_sample_rate);
        if metrics.method == ExtractionMethod::Cycle {
            println!("Pitched windows: {}/{}", metrics.pitched_windows, metrics.window_count);
        }
    }

    Ok(())
}

fn run_generate(args: &GenerateArgs, config_file: Option<&Path>, verbose: bool) -> Result<()> {
    let config = Config::from_output_args(&args.output, args.table_size, args.format, config_file, verbose)
        .context("Invalid configuration")?;

    let table = generate(args.shape, config.table_size())?;
    write_stack(&config, &Stack::single(table))?;

    println!(
        "Generated {} table ({} samples) -> {}",
        args.shape,
        config.table_size(),
        config.output_path.display()
    );
    Ok(())
}

fn run_morph(args: &MorphArgs, config_file: Option<&Path>, verbose: bool) -> Result<()> {
    let config = Config::from_output_args(&args.output, args.table_size, args.format, config_file, verbose)
        .context("Invalid configuration")?;

    let from = generate(args.from, config.table_size())?;
    let to = generate(args.to, config.table_size())?;
    let stack = morph(&from, &to, args.steps)?;
    write_stack(&config, &stack)?;

    println!(
        "Morphed {} -> {} in {} tables ({} samples) -> {}",
        args.from,
        args.to,
        stack.len(),
        config.table_size(),
        config.output_path.display()
    );
    Ok(())
}

fn write_stack(config: &Config, stack: &Stack) -> Result<()> {
    create_parent_dir(&config.output_path)?;
    let serializer = StackSerializer::new(SerializerConfig::from_config(config, None))?;
    serializer
        .write_to_file(stack, &config.output_path)
        .with_context(|| format!("Failed to write {}", config.output_path.display()))
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}
