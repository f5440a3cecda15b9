use clap::{Parser, Subcommand};
use phishguard::adapters::ffmpeg::FfmpegExtractor;
use phishguard::adapters::registry::ModelRegistry;
use phishguard::core::audio::{normalize_file, write_wav};
use phishguard::utils::logger;
use phishguard::utils::validation::{Validate, VIDEO_EXTENSIONS};
use phishguard::{AppState, GuardError, Result, TomlConfig};
use std::path::{Path, PathBuf};

/// `test-model` 用的範例網址
const SAMPLE_URLS: &[&str] = &[
    "https://www.google.com",
    "https://www.paypal.com/signin",
    "http://googlee.com.phishing.example.com",
];

#[derive(Debug, Parser)]
#[command(name = "phishguard-util")]
#[command(about = "Operator utilities for the PhishGuard server")]
struct UtilArgs {
    #[arg(short, long, global = true, help = "TOML configuration file")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check config, model files, denylist and ffmpeg
    Check,
    /// Load the phishing model and score a few sample URLs
    TestModel,
    /// Run the deepfake detector on a local audio/video file
    DetectAudio { file: PathBuf },
    /// Write the normalized 16 kHz mono clip of a local file
    Normalize {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn status_line(ok: bool, message: String) -> bool {
    if ok {
        println!("✅ {}", message);
    } else {
        println!("❌ {}", message);
    }
    ok
}

fn check_environment(config_path: Option<&Path>) -> bool {
    println!("Checking PhishGuard environment...");

    let config = match TomlConfig::load(config_path).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => {
            status_line(true, "Configuration is valid".to_string());
            config
        }
        Err(e) => {
            status_line(false, format!("Configuration error: {}", e.user_friendly_message()));
            return false;
        }
    };

    let mut ok = true;
    let phishing_model = Path::new(&config.phishing.model_path);
    ok &= status_line(
        phishing_model.exists(),
        format!("Phishing model at {}", phishing_model.display()),
    );

    let deepfake_model = Path::new(&config.deepfake.model_path);
    ok &= status_line(
        deepfake_model.exists(),
        format!("Deepfake model at {}", deepfake_model.display()),
    );
    let labels = config.labels_path();
    ok &= status_line(labels.exists(), format!("Deepfake labels at {}", labels.display()));

    // 拒絕清單不存在不算錯，只是空清單
    let denylist = Path::new(&config.phishing.denylist_path);
    if denylist.exists() {
        status_line(true, format!("Denylist at {}", denylist.display()));
    } else {
        println!("ℹ️ Denylist {} not found (treated as empty)", denylist.display());
    }

    let ffmpeg = FfmpegExtractor::new(config.deepfake.ffmpeg_path.clone());
    ok &= status_line(
        ffmpeg.is_available(),
        format!("ffmpeg available as {}", ffmpeg.binary().display()),
    );

    if ok {
        println!("✅ Environment check completed successfully");
    }
    ok
}

async fn test_model(config: TomlConfig) -> Result<()> {
    let registry = ModelRegistry::load(&config);
    if let Some(reason) = registry.phishing_outcome().reason() {
        return Err(GuardError::ModelUnavailableError {
            model: "phishing model".to_string(),
            reason: reason.to_string(),
        });
    }
    println!("✅ Model loaded successfully");

    let state = AppState::build(config, registry)?;
    for url in SAMPLE_URLS {
        let record = state.assembler.assemble(url).await?;
        let verdict = state.scorer.score(url, &record).await?;
        println!(
            "{} -> {} (confidence: {:.2})",
            url, verdict.label, verdict.confidence
        );
    }
    Ok(())
}

fn audio_path_for(input: &Path, ffmpeg: &FfmpegExtractor, scratch: &Path) -> Result<PathBuf> {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        let wav = scratch.join("audio.wav");
        ffmpeg.extract_audio(input, &wav)?;
        Ok(wav)
    } else {
        Ok(input.to_path_buf())
    }
}

fn detect_audio(config: &TomlConfig, file: &Path) -> Result<()> {
    let registry = ModelRegistry::load(config);
    let scratch = tempfile::tempdir()?;
    let ffmpeg = FfmpegExtractor::new(config.deepfake.ffmpeg_path.clone());

    let audio = audio_path_for(file, &ffmpeg, scratch.path())?;
    let normalized = normalize_file(&audio)?;
    let result = registry.deepfake().score(&normalized.clip)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn normalize(config: &TomlConfig, input: &Path, output: &Path) -> Result<()> {
    let scratch = tempfile::tempdir()?;
    let ffmpeg = FfmpegExtractor::new(config.deepfake.ffmpeg_path.clone());

    let audio = audio_path_for(input, &ffmpeg, scratch.path())?;
    let normalized = normalize_file(&audio)?;
    write_wav(output, &normalized.clip)?;

    println!(
        "✅ Wrote {} ({} samples @ {} Hz, source {} Hz / {} ch)",
        output.display(),
        normalized.clip.samples.len(),
        normalized.clip.sample_rate,
        normalized.source_sample_rate,
        normalized.source_channels
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = UtilArgs::parse();
    logger::init_cli_logger(args.verbose);

    if let Command::Check = args.command {
        if !check_environment(args.config.as_deref()) {
            std::process::exit(1);
        }
        return Ok(());
    }

    let config = TomlConfig::load(args.config.as_deref())?;
    config.validate()?;

    let outcome = match &args.command {
        Command::Check => Ok(()),
        Command::TestModel => test_model(config).await,
        Command::DetectAudio { file } => detect_audio(&config, file),
        Command::Normalize { input, output } => normalize(&config, input, output),
    };

    if let Err(e) = outcome {
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(1);
    }
    Ok(())
}
