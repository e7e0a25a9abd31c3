use std::env;
use std::path::{Path, PathBuf};

const WATCHED_VARIABLES: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // ffmpeg-sys-next finds FFmpeg through pkg-config everywhere but Windows.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    match vcpkg_ffmpeg_dir() {
        Some(directory) if directory.exists() => report_vcpkg_install(&directory),
        Some(directory) => println!(
            "cargo:warning=VCPKG_ROOT is set but no FFmpeg install was found at {}.",
            directory.display()
        ),
        None => println!(
            "cargo:warning=FFMPEG_DIR is not set. vtranscode needs FFmpeg with libavcodec encoders; on Windows install it via vcpkg and set FFMPEG_DIR."
        ),
    }
}

fn vcpkg_ffmpeg_dir() -> Option<PathBuf> {
    let root = env::var("VCPKG_ROOT").ok()?;
    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    Some(PathBuf::from(root).join("installed").join(triplet))
}

fn report_vcpkg_install(directory: &Path) {
    println!(
        "cargo:warning=Using vcpkg FFmpeg at {0}. Set FFMPEG_DIR={0} to make discovery explicit.",
        directory.display()
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=Set VCPKGRS_DYNAMIC=1 when linking a dynamic vcpkg FFmpeg build.");
    }
}
