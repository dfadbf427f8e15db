use std::io::Write;
use std::sync::Arc;

use shadekit::{AdaptiveShadingKernel, FsDemFolder, RenderConfig};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("usage: shadekit <dem-folder> <lat> <lon> [zoom] [out.pgm]");
        std::process::exit(2);
    }

    let dem_folder = &args[1];
    let lat: f64 = args[2].parse().expect("latitude must be a number");
    let lon: f64 = args[3].parse().expect("longitude must be a number");
    let zoom: i32 = args.get(4).map(|z| z.parse().expect("zoom")).unwrap_or(12);
    let out_path = args.get(5).cloned().unwrap_or_else(|| "shade.pgm".to_string());

    println!("shadekit - hillshading tile demo\n");
    println!("DEM folder: {}", dem_folder);

    let config = RenderConfig::new(Arc::new(AdaptiveShadingKernel::new()));
    config.set_dem_folder(Arc::new(FsDemFolder::new(dem_folder)));
    config.apply_configuration(false);

    if let Some(cache) = config.current_cache() {
        println!("Indexed tiles: {}", cache.indexed_tiles());
        let problems = cache.index_problems();
        if !problems.is_empty() {
            println!("Index problems:");
            for problem in &problems {
                println!("  - {}", problem);
            }
        }
    }

    println!("\nRendering tile at ({}, {}), zoom {}...", lat, lon, zoom);

    // Pixels per degree at this zoom for 256px tiles.
    let px_per_degree = 256.0 * (1u64 << zoom) as f64 / 360.0;

    match config.shading_tile(lat, lon, zoom, px_per_degree, px_per_degree) {
        Some(tile) => {
            println!("Rendered {}x{} pixels", tile.width(), tile.height());

            let pixels = tile.pixels();
            let mut file = std::fs::File::create(&out_path).expect("output file");
            write!(file, "P5\n{} {}\n255\n", tile.width(), tile.height()).unwrap();
            file.write_all(&pixels).unwrap();
            println!("Wrote {}", out_path);
        }
        None => {
            println!("No DEM tile covers that position (or zoom is out of range).");
        }
    }
}
