use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser};
use log::info;

use deckfill::config::{find_default_config, init_default_config, load_config, AppConfig};
use deckfill::pptx::CompressionMode;
use deckfill::{MarkerValueMap, TemplateEngine};

#[derive(Parser, Debug)]
#[command(name = "deckfill")]
#[command(about = "Find and fill [n] markers in a slide deck template", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Template deck (.pptx)
    #[arg(value_name = "PPTX")]
    input: Option<PathBuf>,

    /// 1-based slide number
    #[arg(short, long, default_value_t = 1)]
    slide: usize,

    /// Print the number of slides and exit
    #[arg(long)]
    slide_count: bool,

    /// Print the slide's template inputs as JSON
    #[arg(long)]
    extract: bool,

    /// Write the slide's template inputs as JSON to this file
    #[arg(long, value_name = "JSON")]
    extract_json: Option<PathBuf>,

    /// Marker -> value JSON object (e.g. {"[1]": "On track"}) to fill the slide with
    #[arg(long, value_name = "JSON")]
    values: Option<PathBuf>,

    /// Output deck (default: <input_stem>_filled.pptx, or [engine].output_dir from config)
    #[arg(short, long, value_name = "PPTX")]
    output: Option<PathBuf>,

    /// Archive compression: deflate, store or preserve (overrides config)
    #[arg(long, value_parser = parse_compression)]
    compression: Option<CompressionMode>,

    /// Config file path (default: $DECKFILL_CONFIG, or search for deckfill.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn parse_compression(s: &str) -> Result<CompressionMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "deflate" => Ok(CompressionMode::Deflate),
        "store" | "none" => Ok(CompressionMode::Store),
        "preserve" => Ok(CompressionMode::Preserve),
        other => Err(format!("unknown compression {other:?} (deflate|store|preserve)")),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_app_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = path.map(Path::to_path_buf).or_else(find_default_config);
    match path {
        Some(p) => {
            let cfg = load_config(&p).with_context(|| format!("load config: {}", p.display()))?;
            info!("config: {}", p.display());
            Ok(cfg)
        }
        None => Ok(AppConfig::default()),
    }
}

fn read_values(path: &Path) -> anyhow::Result<MarkerValueMap> {
    let bytes = std::fs::read(path).with_context(|| format!("read values: {}", path.display()))?;
    serde_json::from_slice(&bytes).context("values must be a JSON object of strings")
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let input = match args.input.clone() {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  deckfill <deck.pptx> --slide 2 --extract\n  deckfill <deck.pptx> --slide 2 --values values.json -o filled.pptx\n"
            );
            return Ok(());
        }
    };

    let cfg = load_app_config(args.config.as_deref())?;
    let mut compression = cfg.compression();
    if let Some(mode) = args.compression {
        compression.mode = mode;
    }

    let template_dir = input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let template_file = input
        .file_name()
        .and_then(|s| s.to_str())
        .context("input must name a file")?
        .to_string();

    let output = match args.output.clone() {
        Some(p) => p,
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output")
                .to_string();
            let dir = cfg
                .engine
                .output_dir
                .clone()
                .unwrap_or_else(|| template_dir.clone());
            dir.join(format!("{stem}_filled.pptx"))
        }
    };
    let output_dir = output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let engine =
        TemplateEngine::new(&template_dir, &output_dir, template_file).with_compression(compression);

    if args.slide_count {
        println!("{}", engine.slide_count()?);
        return Ok(());
    }

    if args.extract || args.extract_json.is_some() {
        let extraction = engine.extract_template_inputs(args.slide)?;
        let json = serde_json::to_string_pretty(&extraction).context("serialize extraction")?;
        match args.extract_json.as_ref() {
            Some(path) => std::fs::write(path, json.as_bytes())
                .with_context(|| format!("write extraction: {}", path.display()))?,
            None => println!("{json}"),
        }
        if args.values.is_none() {
            return Ok(());
        }
    }

    let Some(values_path) = args.values.as_ref() else {
        return Err(anyhow!(
            "nothing to do: pass --extract, --extract-json, --values or --slide-count"
        ));
    };
    let values = read_values(values_path)?;
    let extraction = engine.extract_template_inputs(args.slide)?;
    let output_name = output
        .file_name()
        .and_then(|s| s.to_str())
        .context("output must name a file")?;
    let written = engine.fill_template(args.slide, &extraction.inputs, &values, output_name)?;
    eprintln!("Wrote: {}", written.display());
    Ok(())
}
