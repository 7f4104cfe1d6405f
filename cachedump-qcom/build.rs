use std::{
    env,
    error::Error,
    fs::{self, File},
    io::Write,
    path::Path,
};

fn main() -> Result<(), Box<dyn Error>> {
    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("embedded_layouts.rs");
    let mut all_the_files = File::create(&dest_path)?;

    println!("cargo:rerun-if-changed=layouts");

    let mut schemas = Vec::new();

    // iterate layouts folder
    for f in fs::read_dir("./layouts")? {
        let f = f?;

        if !f.file_type()?.is_file() {
            continue;
        }

        let path = f.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        println!("cargo:rerun-if-changed={}", path.display());

        let cpu_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or("invalid layout file name")?
            .to_string();

        // malformed schemas should never make it into the binary
        let text = fs::read_to_string(&path)?;
        let document: serde_json::Value = serde_json::from_str(&text)
            .map_err(|err| format!("{}: {}", path.display(), err))?;
        if !document.is_object() {
            return Err(format!("{}: top level is not an object", path.display()).into());
        }

        schemas.push((cpu_name, fs::canonicalize(&path)?));
    }

    schemas.sort();

    writeln!(all_the_files, "pub const EMBEDDED_LAYOUTS: &[(&str, &str)] = &[")?;
    for (cpu_name, path) in schemas.iter() {
        writeln!(
            all_the_files,
            "    ({:?}, include_str!({:?})),",
            cpu_name,
            path.display().to_string()
        )?;
    }
    writeln!(all_the_files, "];")?;

    Ok(())
}
