//! Hardware-accelerated video encoding.
//!
//! This module provides [`HardwareAccelerationMode`] for controlling which
//! video encoder a transcoding session tries first. FFmpeg exposes hardware
//! encoders as separately named codecs (`h264_nvenc`, `hevc_qsv`, ...), so
//! selecting one is a matter of trying candidate names in order and keeping
//! the first that opens. When none does, the session falls back to the
//! software encoder.
//!
//! # Platform Support
//!
//! Hardware encoder availability depends on both the FFmpeg build and the
//! host system's GPU drivers. A candidate that exists in the build may still
//! fail to open when the device is missing; the writer then moves on to the
//! next candidate.

use std::ffi::CStr;

use ffmpeg_sys_next::AVHWDeviceType;

use crate::profile::VideoCodec;

/// Hardware acceleration mode for video encoding.
///
/// # Example
///
/// ```no_run
/// use vtranscode::{HardwareAccelerationMode, HardwareDeviceType, TranscodeOptions};
///
/// let options = TranscodeOptions::new()
///     .with_hardware_acceleration(HardwareAccelerationMode::Specific(HardwareDeviceType::Cuda));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareAccelerationMode {
    /// Try every hardware encoder, then fall back to software.
    #[default]
    Auto,
    /// Software encoding only.
    Software,
    /// Try the encoder of one device type, then fall back to software.
    Specific(HardwareDeviceType),
}

/// Hardware encoder families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareDeviceType {
    /// NVIDIA NVENC (Linux, Windows).
    Cuda,
    /// Intel Quick Sync Video (cross-platform).
    Qsv,
    /// Video Acceleration API (Linux).
    Vaapi,
    /// Apple VideoToolbox (macOS, iOS).
    VideoToolbox,
    /// AMD Advanced Media Framework (Windows).
    Amf,
}

impl HardwareDeviceType {
    /// Every device type this crate knows an encoder for.
    pub const ALL: [HardwareDeviceType; 5] = [
        HardwareDeviceType::Cuda,
        HardwareDeviceType::Qsv,
        HardwareDeviceType::Vaapi,
        HardwareDeviceType::VideoToolbox,
        HardwareDeviceType::Amf,
    ];

    /// Short lowercase name, as used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            HardwareDeviceType::Cuda => "cuda",
            HardwareDeviceType::Qsv => "qsv",
            HardwareDeviceType::Vaapi => "vaapi",
            HardwareDeviceType::VideoToolbox => "videotoolbox",
            HardwareDeviceType::Amf => "amf",
        }
    }

    /// Parse a name produced by [`name`](HardwareDeviceType::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|device| device.name().eq_ignore_ascii_case(name))
    }

    /// FFmpeg encoder name of this device for `codec`.
    pub fn encoder_name(self, codec: VideoCodec) -> &'static str {
        match (self, codec) {
            (HardwareDeviceType::Cuda, VideoCodec::H264) => "h264_nvenc",
            (HardwareDeviceType::Cuda, VideoCodec::Hevc) => "hevc_nvenc",
            (HardwareDeviceType::Qsv, VideoCodec::H264) => "h264_qsv",
            (HardwareDeviceType::Qsv, VideoCodec::Hevc) => "hevc_qsv",
            (HardwareDeviceType::Vaapi, VideoCodec::H264) => "h264_vaapi",
            (HardwareDeviceType::Vaapi, VideoCodec::Hevc) => "hevc_vaapi",
            (HardwareDeviceType::VideoToolbox, VideoCodec::H264) => "h264_videotoolbox",
            (HardwareDeviceType::VideoToolbox, VideoCodec::Hevc) => "hevc_videotoolbox",
            (HardwareDeviceType::Amf, VideoCodec::H264) => "h264_amf",
            (HardwareDeviceType::Amf, VideoCodec::Hevc) => "hevc_amf",
        }
    }

    /// Map an FFmpeg device type through its registered name, so device
    /// types missing from older FFmpeg headers (AMF) still resolve.
    fn from_av_hw_device_type(device_type: AVHWDeviceType) -> Option<Self> {
        let name = unsafe { ffmpeg_sys_next::av_hwdevice_get_type_name(device_type) };
        if name.is_null() {
            return None;
        }
        let name = unsafe { CStr::from_ptr(name) }.to_str().ok()?;
        Self::from_name(name)
    }
}

/// Software encoder name for `codec`.
pub fn software_encoder_name(codec: VideoCodec) -> &'static str {
    match codec {
        VideoCodec::H264 => "libx264",
        VideoCodec::Hevc => "libx265",
    }
}

/// Encoder names to try, in order, for `codec` under `mode`.
///
/// [`HardwareAccelerationMode::Auto`] tries the devices of the FFmpeg build
/// in the order FFmpeg reports them. The software encoder always comes last.
pub fn encoder_candidates(mode: HardwareAccelerationMode, codec: VideoCodec) -> Vec<&'static str> {
    let devices = match mode {
        HardwareAccelerationMode::Auto => available_hardware_devices(),
        _ => Vec::new(),
    };
    encoder_candidates_among(mode, codec, &devices)
}

/// Encoder names to try for `codec` under `mode` when the FFmpeg build
/// supports `devices`, in that order.
pub fn encoder_candidates_among(
    mode: HardwareAccelerationMode,
    codec: VideoCodec,
    devices: &[HardwareDeviceType],
) -> Vec<&'static str> {
    let mut candidates: Vec<&'static str> = match mode {
        HardwareAccelerationMode::Auto => devices
            .iter()
            .map(|device| device.encoder_name(codec))
            .collect(),
        HardwareAccelerationMode::Software => Vec::new(),
        HardwareAccelerationMode::Specific(device) => vec![device.encoder_name(codec)],
    };
    candidates.push(software_encoder_name(codec));
    candidates
}

/// Whether `encoder_name` names a hardware encoder.
pub fn is_hardware_encoder(encoder_name: &str) -> bool {
    HardwareDeviceType::ALL.into_iter().any(|device| {
        device.encoder_name(VideoCodec::H264) == encoder_name
            || device.encoder_name(VideoCodec::Hevc) == encoder_name
    })
}

/// List the hardware device types supported by the FFmpeg build.
pub fn available_hardware_devices() -> Vec<HardwareDeviceType> {
    let mut devices = Vec::new();
    let mut device_type = AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;

    loop {
        device_type = unsafe { ffmpeg_sys_next::av_hwdevice_iterate_types(device_type) };
        if device_type == AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            break;
        }

        if let Some(device) = HardwareDeviceType::from_av_hw_device_type(device_type)
            && !devices.contains(&device)
        {
            devices.push(device);
        }
    }

    devices
}

/// List the hardware encoders for `codec` compiled into the FFmpeg build.
///
/// Presence in the build does not guarantee the device exists on this host.
pub fn available_hardware_encoders(codec: VideoCodec) -> Vec<(HardwareDeviceType, &'static str)> {
    HardwareDeviceType::ALL
        .into_iter()
        .map(|device| (device, device.encoder_name(codec)))
        .filter(|(_, name)| ffmpeg_next::encoder::find_by_name(name).is_some())
        .collect()
}

/// Encoder `preset` option for a quality-vs-speed value in `[1, 100]`.
///
/// Higher values select slower presets. Returns `None` for encoders
/// without a preset scale.
pub fn speed_preset(encoder_name: &str, quality_vs_speed: u32) -> Option<&'static str> {
    const NVENC_PRESETS: [&str; 7] = ["p1", "p2", "p3", "p4", "p5", "p6", "p7"];
    const X26X_PRESETS: [&str; 7] = [
        "veryfast", "faster", "fast", "medium", "slow", "slower", "veryslow",
    ];

    let step = ((quality_vs_speed.clamp(1, 100) - 1) * 6 / 99) as usize;
    if encoder_name.ends_with("_nvenc") {
        Some(NVENC_PRESETS[step])
    } else if encoder_name.starts_with("libx26") || encoder_name.ends_with("_qsv") {
        Some(X26X_PRESETS[step])
    } else {
        None
    }
}
