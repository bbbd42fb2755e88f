use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

const DRIVER_SOURCE: &str = "src/async.rs";

fn main() -> std::io::Result<()> {
    // The blocking driver is the async driver with every suspension point removed
    println!("cargo:rerun-if-changed={DRIVER_SOURCE}");
    let source = std::fs::read_to_string(DRIVER_SOURCE)?;

    let blocking = source
        .replace("embedded_hal_async", "embedded_hal")
        .replace("async", "")
        .replace(".await", "");

    let mut out_path = PathBuf::from(env::var("OUT_DIR").expect("cargo always sets OUT_DIR"));
    out_path.push("de-asynced.rs");

    File::create(out_path)?.write_all(blocking.as_bytes())?;

    Ok(())
}
