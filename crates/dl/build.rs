//! Passes the target triple on to the tests that compile C modules.

fn main() {
    if let Ok(target) = std::env::var("TARGET") {
        println!("cargo:rustc-env=PKNATIVE_DL_TARGET={target}");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
