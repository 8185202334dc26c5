//! Build script for hooktrace-layer
//!
//! Compiles the C collectors for the variadic `execl` family. Only a C
//! compiler can walk a `va_list` portably; the collected argv is handed back
//! to Rust.

fn main() {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "linux" {
        println!("cargo:rerun-if-changed=src/c/variadic_exec.c");

        cc::Build::new()
            .file("src/c/variadic_exec.c")
            .flag_if_supported("-fvisibility=hidden")
            .opt_level(2)
            .compile("variadic_exec");
    }
}
