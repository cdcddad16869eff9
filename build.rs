// Link extra system libraries for the static FFmpeg build (webcam support)
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if std::env::var_os("CARGO_FEATURE_FFMPEG").is_none() {
        return;
    }

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_env = std::env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();

    // vcpkg static FFmpeg on Windows MSVC pulls these in
    if target_os == "windows" && target_env == "msvc" {
        // DirectShow capture
        println!("cargo:rustc-link-lib=dylib=strmiids");
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");

        // Secure Channel (TLS)
        println!("cargo:rustc-link-lib=dylib=secur32");
    }
}
