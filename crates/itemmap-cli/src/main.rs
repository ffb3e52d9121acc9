use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use itemmap::{BitmapFormat, CheckConfig, CheckOutcome, RelationFixture, TracingSink};
use tracing::{debug, info};

#[derive(Debug, PartialEq, Eq)]
struct CliConfig {
    fixture_path: PathBuf,
    config_path: Option<PathBuf>,
    format: Option<BitmapFormat>,
    output_path: Option<PathBuf>,
    save_dir: Option<PathBuf>,
    verbose: bool,
}

fn print_help() {
    let help = "\
itemmap-check — heap/index consistency check over decoded page fixtures

USAGE:
    itemmap-check --fixture <PATH> [OPTIONS]

OPTIONS:
    --fixture <PATH>         JSON fixture with heap pages and index pages (required)
    --config <PATH>          JSON check config (defaults for 8 KiB pages when omitted)
    --format <FORMAT>        Bitmap dump format: none, binary, hex, base64
    --output <PATH>          Write JSON report to path (stdout when omitted)
    --save-bitmaps <DIR>     Persist the heap bitmap and one bitmap per index
    -v, --verbose            Log per-page integration at DEBUG
    -h, --help               Show this help
";
    println!("{help}");
}

fn take_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str, String> {
    *index += 1;
    args.get(*index)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let mut fixture_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut format: Option<BitmapFormat> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut save_dir: Option<PathBuf> = None;
    let mut verbose = false;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--fixture" => {
                fixture_path = Some(PathBuf::from(take_value(args, &mut index, "--fixture")?));
            }
            "--config" => {
                config_path = Some(PathBuf::from(take_value(args, &mut index, "--config")?));
            }
            "--format" => {
                format = Some(take_value(args, &mut index, "--format")?.parse::<BitmapFormat>()?);
            }
            "--output" => {
                output_path = Some(PathBuf::from(take_value(args, &mut index, "--output")?));
            }
            "--save-bitmaps" => {
                save_dir = Some(PathBuf::from(take_value(
                    args,
                    &mut index,
                    "--save-bitmaps",
                )?));
            }
            "-v" | "--verbose" => verbose = true,
            "-h" | "--help" => {
                print_help();
                return Err(String::new());
            }
            unknown => {
                return Err(format!("unknown option: {unknown}"));
            }
        }
        index += 1;
    }

    let fixture_path = fixture_path.ok_or_else(|| "--fixture is required".to_owned())?;
    Ok(CliConfig {
        fixture_path,
        config_path,
        format,
        output_path,
        save_dir,
        verbose,
    })
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_check_config(cli: &CliConfig) -> Result<CheckConfig, String> {
    let mut config = match &cli.config_path {
        Some(path) => CheckConfig::from_json_file(path).map_err(|error| error.to_string())?,
        None => CheckConfig::default(),
    };
    if let Some(format) = cli.format {
        config.format = format;
    }
    config.bitmap.validate().map_err(|error| error.to_string())?;
    Ok(config)
}

/// File name for a persisted index bitmap; keeps names filesystem-safe.
fn bitmap_file_name(position: usize, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("index-{position}-{safe}.bitmap")
}

fn save_bitmaps(dir: &Path, outcome: &CheckOutcome) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|error| format!("bitmap_dir_create_failed path={} error={error}", dir.display()))?;

    let heap_path = dir.join("heap.bitmap");
    outcome.heap.save(&heap_path).map_err(|error| {
        format!(
            "bitmap_write_failed path={} error={error}",
            heap_path.display()
        )
    })?;
    for (position, (bitmap, report)) in outcome
        .indexes
        .iter()
        .zip(&outcome.report.indexes)
        .enumerate()
    {
        let path = dir.join(bitmap_file_name(position, &report.name));
        bitmap
            .save(&path)
            .map_err(|error| format!("bitmap_write_failed path={} error={error}", path.display()))?;
        debug!(index = %report.name, path = %path.display(), "index bitmap saved");
    }
    info!(dir = %dir.display(), indexes = outcome.indexes.len(), "bitmaps saved");
    Ok(())
}

fn run(args: &[String]) -> Result<i32, String> {
    let cli = parse_args(args)?;
    init_logging(cli.verbose);

    let config = load_check_config(&cli)?;
    let fixture =
        RelationFixture::from_json_file(&cli.fixture_path).map_err(|error| error.to_string())?;
    info!(
        fixture = %cli.fixture_path.display(),
        heap_pages = fixture.heap.len(),
        indexes = fixture.indexes.len(),
        format = %config.format,
        "starting heap/index check"
    );

    let outcome = fixture
        .check(&config, &TracingSink)
        .map_err(|error| error.to_string())?;
    if let Some(dir) = &cli.save_dir {
        save_bitmaps(dir, &outcome)?;
    }

    let payload = serde_json::to_string_pretty(&outcome.report)
        .map_err(|error| format!("report_serialize_failed: {error}"))?;
    if let Some(output_path) = &cli.output_path {
        std::fs::write(output_path, payload).map_err(|error| {
            format!(
                "report_write_failed path={} error={error}",
                output_path.display()
            )
        })?;
    } else {
        println!("{payload}");
    }

    if outcome.report.is_consistent() {
        return Ok(0);
    }
    for index in outcome
        .report
        .indexes
        .iter()
        .filter(|index| !index.is_consistent())
    {
        eprintln!(
            "WARN index={} differing_items={} errors={} missing_from_index={} missing_from_heap={}",
            index.name,
            index.differing_items,
            index.errors,
            index.missing_from_index.len(),
            index.missing_from_heap.len()
        );
    }
    Ok(1)
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(1) => ExitCode::from(1),
        Ok(_) => ExitCode::from(2),
        Err(error) if error.is_empty() => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("ERROR itemmap-check failed: {error}");
            ExitCode::from(2)
        }
    }
}
