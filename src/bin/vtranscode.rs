use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use vtranscode::{
    EncoderSettings, FfmpegLogLevel, HardwareAccelerationMode, HardwareDeviceType, MediaDetails,
    ProgressCallback, ProgressInfo, TargetFactor, TranscodeOptions, Transcoder, VideoCodec,
    hardware_acceleration::{available_hardware_devices, available_hardware_encoders},
    progress::BAR_STEPS,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vtranscode transcode input.mp4 output.mp4 --encoder hevc --quality 0.3\n  vtranscode probe input.mkv --json\n  vtranscode encoders\n  vtranscode completions zsh > _vtranscode";

#[derive(Debug, Parser)]
#[command(
    name = "vtranscode",
    version,
    about = "Re-encode media files to H.264/HEVC and AAC",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Transcode a media file.
    #[command(
        about = "Transcode a media file",
        after_help = "Examples:\n  vtranscode transcode input.mp4 output.mp4\n  vtranscode transcode input.mkv output.mp4 --encoder hevc --quality 0.25 --no-hw-accel"
    )]
    Transcode {
        /// Input media path.
        input: PathBuf,
        /// Output media path. The container is inferred from the extension.
        output: PathBuf,
        /// Output video codec: h264 | hevc.
        #[arg(long, default_value = "h264")]
        encoder: String,
        /// Target size/quality as a fraction of the source data rate, in (0, 1].
        #[arg(long, default_value_t = 0.5)]
        quality: f64,
        /// Use software encoders only.
        #[arg(long, conflicts_with = "hardware")]
        no_hw_accel: bool,
        /// Hardware encoder device (auto, software, cuda, qsv, vaapi, videotoolbox, amf).
        #[arg(long)]
        hardware: Option<String>,
        /// Hide the progress bar.
        #[arg(long)]
        quiet: bool,
    },

    /// Print the decoded streams and the encoder settings they would get.
    #[command(
        about = "Inspect streams and planned encoder settings",
        visible_alias = "info",
        after_help = "Examples:\n  vtranscode probe input.mp4\n  vtranscode probe input.mp4 --json --quality 0.3"
    )]
    Probe {
        /// Input media path.
        input: PathBuf,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
        /// Output video codec: h264 | hevc.
        #[arg(long, default_value = "h264")]
        encoder: String,
        /// Target size/quality factor, in (0, 1].
        #[arg(long, default_value_t = 0.5)]
        quality: f64,
    },

    /// List hardware devices and encoders in the FFmpeg build.
    #[command(about = "List hardware encoders")]
    Encoders,

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_codec(value: &str) -> Option<VideoCodec> {
    match value.to_ascii_lowercase().as_str() {
        "h264" | "avc" | "x264" => Some(VideoCodec::H264),
        "hevc" | "h265" | "x265" => Some(VideoCodec::Hevc),
        _ => None,
    }
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn parse_hardware_mode(value: &str) -> Option<HardwareAccelerationMode> {
    match value.to_ascii_lowercase().as_str() {
        "auto" => Some(HardwareAccelerationMode::Auto),
        "software" | "sw" | "cpu" => Some(HardwareAccelerationMode::Software),
        other => HardwareDeviceType::from_name(other).map(HardwareAccelerationMode::Specific),
    }
}

fn hardware_mode(
    no_hw_accel: bool,
    hardware: Option<&str>,
) -> Result<HardwareAccelerationMode, Box<dyn std::error::Error>> {
    if no_hw_accel {
        return Ok(HardwareAccelerationMode::Software);
    }
    match hardware {
        Some(value) => {
            Ok(parse_hardware_mode(value).ok_or(format!("unsupported --hardware mode: {value}"))?)
        }
        None => Ok(HardwareAccelerationMode::Auto),
    }
}

fn build_options(encoder: &str, quality: f64) -> Result<TranscodeOptions, Box<dyn std::error::Error>> {
    let codec = parse_codec(encoder).ok_or(format!("unsupported --encoder: {encoder}"))?;
    let target_factor = TargetFactor::new(quality)?;
    Ok(TranscodeOptions::new()
        .with_codec(codec)
        .with_target_factor(target_factor))
}

fn init_logging(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .try_init();

    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        vtranscode::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(u64::from(BAR_STEPS));
        let style = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(u64::from(info.steps));
        if info.finished {
            self.bar.finish_with_message(format!(
                "100% in {}",
                format_duration(info.elapsed)
            ));
            return;
        }
        let remaining = info
            .estimated_remaining
            .map(format_duration)
            .unwrap_or_else(|| "--:--:--".to_string());
        self.bar.set_message(format!(
            "{:3}% elapsed {} remaining {}",
            info.percent,
            format_duration(info.elapsed),
            remaining
        ));
    }
}

fn settings_json(settings: &Option<EncoderSettings>) -> serde_json::Value {
    match settings {
        Some(EncoderSettings::Video(video)) => json!({
            "codec": video.codec.name(),
            "profile": video.codec.profile(),
            "width": video.width,
            "height": video.height,
            "frame_rate": video.frame_rate.to_string(),
            "average_bit_rate": video.average_bit_rate,
            "quality_vs_speed": video.quality_vs_speed,
        }),
        Some(EncoderSettings::Audio(audio)) => json!({
            "codec": "aac",
            "sample_rate": audio.sample_rate,
            "channels": audio.channels,
            "average_bytes_per_second": audio.average_bytes_per_second,
            "quality_vs_speed": audio.quality_vs_speed,
        }),
        None => serde_json::Value::Null,
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global)?;

    match cli.command {
        Commands::Transcode {
            input,
            output,
            encoder,
            quality,
            no_hw_accel,
            hardware,
            quiet,
        } => {
            let mut options = build_options(&encoder, quality)?
                .with_hardware_acceleration(hardware_mode(no_hw_accel, hardware.as_deref())?);
            if !quiet {
                options = options.with_progress(Arc::new(TerminalProgress::new()?));
            }

            let summary = Transcoder::open(&input, options)?.run(&output)?;

            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Transcoded {} sample(s) into {} stream(s) in {}",
                    summary.samples_written,
                    summary.output_streams,
                    format_duration(summary.elapsed)
                )
                .green()
            );
            if summary.hardware_accelerated {
                println!("{} hardware encoder", "using".cyan().bold());
            }
            if summary.gaps_placed > 0 {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("{} timeline gap(s) in the source", summary.gaps_placed).yellow()
                );
            }
            println!("{} {}", "saved".green().bold(), output.display());
        }
        Commands::Probe {
            input,
            json,
            encoder,
            quality,
        } => {
            let options = build_options(&encoder, quality)?;
            let mut transcoder = Transcoder::open(&input, options)?;
            let duration = transcoder.duration();
            let plans = transcoder.plan()?;

            if json {
                let streams: Vec<_> = plans
                    .iter()
                    .map(|plan| {
                        json!({
                            "index": plan.source_index,
                            "kind": plan.descriptor.kind.to_string(),
                            "decoded_subtype": plan.descriptor.decoded_type.subtype.to_string(),
                            "original_data_rate": plan.descriptor.original_data_rate,
                            "encoder": settings_json(&plan.settings),
                        })
                    })
                    .collect();
                let payload = json!({
                    "duration_seconds": duration.map(|duration| duration.as_secs_f64()),
                    "streams": streams,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                if let Some(duration) = duration {
                    println!("Duration: {}", format_duration(duration));
                }
                for plan in &plans {
                    let descriptor = &plan.descriptor;
                    match &descriptor.decoded_type.details {
                        MediaDetails::Video(video) => println!(
                            "Stream {}: video {}x{} [{}], source {:.1} kbit/s",
                            plan.source_index,
                            video.width,
                            video.height,
                            descriptor.decoded_type.subtype,
                            f64::from(descriptor.original_data_rate) / 1000.0
                        ),
                        MediaDetails::Audio(audio) => println!(
                            "Stream {}: audio {} Hz, {} ch [{}], source {:.1} kbit/s",
                            plan.source_index,
                            audio.sample_rate,
                            audio.channels,
                            descriptor.decoded_type.subtype,
                            f64::from(descriptor.original_data_rate) / 1000.0
                        ),
                        MediaDetails::Other => {
                            println!("Stream {}: {}", plan.source_index, descriptor.kind)
                        }
                    }
                    match &plan.settings {
                        Some(EncoderSettings::Video(video)) => println!(
                            "  -> {} ({}) {:.1} kbit/s, quality vs. speed {}",
                            video.codec.name(),
                            video.codec.profile(),
                            f64::from(video.average_bit_rate) / 1000.0,
                            video.quality_vs_speed
                        ),
                        Some(EncoderSettings::Audio(audio)) => println!(
                            "  -> aac {} B/s",
                            audio.average_bytes_per_second
                        ),
                        None => println!("  -> {}", "not encoded".yellow()),
                    }
                }
            }
        }
        Commands::Encoders => {
            let devices = available_hardware_devices();
            if devices.is_empty() {
                println!("{}", "No hardware device types in this FFmpeg build".yellow());
            } else {
                let names: Vec<_> = devices.iter().map(|device| device.name()).collect();
                println!("Devices: {}", names.join(", "));
            }
            for codec in [VideoCodec::H264, VideoCodec::Hevc] {
                let encoders = available_hardware_encoders(codec);
                if encoders.is_empty() {
                    println!("{}: {}", codec.name(), "software only".yellow());
                } else {
                    let names: Vec<_> = encoders.iter().map(|(_, name)| *name).collect();
                    println!("{}: {}", codec.name(), names.join(", ").green());
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vtranscode", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{
        Cli, Commands, HardwareAccelerationMode, HardwareDeviceType, VideoCodec, build_options,
        format_duration, hardware_mode, parse_codec, parse_hardware_mode, parse_log_level,
    };

    #[test]
    fn parse_codec_aliases() {
        assert_eq!(parse_codec("h264"), Some(VideoCodec::H264));
        assert_eq!(parse_codec("HEVC"), Some(VideoCodec::Hevc));
        assert_eq!(parse_codec("h265"), Some(VideoCodec::Hevc));
        assert!(parse_codec("vp9").is_none());
    }

    #[test]
    fn parse_hardware_mode_names() {
        assert_eq!(parse_hardware_mode("auto"), Some(HardwareAccelerationMode::Auto));
        assert_eq!(parse_hardware_mode("cpu"), Some(HardwareAccelerationMode::Software));
        assert_eq!(
            parse_hardware_mode("CUDA"),
            Some(HardwareAccelerationMode::Specific(HardwareDeviceType::Cuda))
        );
        assert!(parse_hardware_mode("dxva2").is_none());
    }

    #[test]
    fn no_hw_accel_wins_over_default() {
        assert_eq!(
            hardware_mode(true, None).unwrap(),
            HardwareAccelerationMode::Software
        );
        assert_eq!(hardware_mode(false, None).unwrap(), HardwareAccelerationMode::Auto);
        assert!(hardware_mode(false, Some("nonsense")).is_err());
    }

    #[test]
    fn parse_log_level_aliases() {
        assert!(parse_log_level("warn").is_some());
        assert!(parse_log_level("TRACE").is_some());
        assert!(parse_log_level("loud").is_none());
    }

    #[test]
    fn build_options_rejects_bad_quality() {
        assert!(build_options("h264", 0.0).is_err());
        assert!(build_options("h264", 1.5).is_err());
        assert!(build_options("av1", 0.5).is_err());

        let options = build_options("hevc", 0.25).unwrap();
        assert_eq!(options.codec(), VideoCodec::Hevc);
        assert_eq!(options.target_factor().get(), 0.25);
    }

    #[test]
    fn transcode_arguments_parse() {
        let cli = Cli::try_parse_from([
            "vtranscode",
            "transcode",
            "in.mkv",
            "out.mp4",
            "--encoder",
            "hevc",
            "--quality",
            "0.3",
            "--no-hw-accel",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.global.verbose);
        match cli.command {
            Commands::Transcode {
                encoder,
                quality,
                no_hw_accel,
                hardware,
                ..
            } => {
                assert_eq!(encoder, "hevc");
                assert_eq!(quality, 0.3);
                assert!(no_hw_accel);
                assert!(hardware.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_hw_accel_conflicts_with_hardware() {
        let result = Cli::try_parse_from([
            "vtranscode",
            "transcode",
            "in.mkv",
            "out.mp4",
            "--no-hw-accel",
            "--hardware",
            "cuda",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn format_duration_clock() {
        assert_eq!(format_duration(std::time::Duration::from_secs(3725)), "01:02:05");
    }
}
