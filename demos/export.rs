use std::path::PathBuf;
use std::{env, fs, process};

use divakit::Result;
use divakit::formats::farc::{FarcKind, FarcReader};
use divakit::scan::find_sprite_set;
use divakit::sprite::{BcDecoder, SpriteExporter};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args_os().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        eprintln!("usage: export <spr archive or sprite database> [out dir]");
        process::exit(2);
    };
    let out_dir = args.next().map_or_else(|| PathBuf::from("sprites"), PathBuf::from);

    let data = fs::read(&input)?;
    let exporter = SpriteExporter::new(BcDecoder);

    let is_archive = data
        .get(..4)
        .and_then(|tag| <&[u8; 4]>::try_from(tag).ok())
        .and_then(FarcKind::from_tag)
        .is_some();

    if is_archive {
        let reader = FarcReader::new(&data)?;
        for (name, payload) in reader.extract_all().files {
            let set = match find_sprite_set(&payload) {
                Ok(set) => set,
                Err(e) => {
                    println!("{name}: no sprite set ({e})");
                    continue;
                }
            };
            let (batch, saved) = exporter.export_png(&set, &out_dir.join(&name))?;
            println!(
                "{name}: {} sprites written, {} skipped",
                saved.written.len(),
                batch.skipped
            );
        }
    } else {
        let set = find_sprite_set(&data)?;
        let (batch, saved) = exporter.export_png(&set, &out_dir)?;
        println!(
            "{}: {} sprites written, {} skipped",
            input.display(),
            saved.written.len(),
            batch.skipped
        );
    }

    Ok(())
}
