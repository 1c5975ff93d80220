//! Windows-only FFmpeg discovery hints.
//!
//! `ffmpeg-sys-next` finds FFmpeg through `FFMPEG_DIR` or pkg-config. On
//! Windows neither is usually set up, so point at a vcpkg install if one is
//! present.

use std::{env, path::PathBuf};

const WATCHED_VARIABLES: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows")
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Some(install) = vcpkg_install() else {
        println!(
            "cargo:warning=frameshard: FFMPEG_DIR is not set. Install FFmpeg with vcpkg and set VCPKG_ROOT or FFMPEG_DIR."
        );
        return;
    };

    if !install.exists() {
        println!(
            "cargo:warning=frameshard: no vcpkg FFmpeg install at {}.",
            install.display()
        );
        return;
    }

    println!(
        "cargo:warning=frameshard: found vcpkg FFmpeg at {0}; set FFMPEG_DIR={0} to use it explicitly.",
        install.display()
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=frameshard: set VCPKGRS_DYNAMIC=1 for dynamic vcpkg FFmpeg builds.");
    }
}

fn vcpkg_install() -> Option<PathBuf> {
    let root = env::var_os("VCPKG_ROOT")?;
    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    Some(PathBuf::from(root).join("installed").join(triplet))
}
