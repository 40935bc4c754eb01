//! Loads an image through the resource cache (C2), then watches its directory and reports
//! when a hot-reload bumps the resource's generation counter. Exits after one reload or a
//! ten-second timeout, whichever comes first.

use std::time::{Duration, Instant};

use ferrox_core::cache::{LoadFlags, Payload, ResourceCache};

fn main() {
    env_logger::init();

    let dir = std::env::args().nth(1).map(std::path::PathBuf::from).unwrap_or_else(|| {
        let dir = tempfile_dir();
        seed_fixture(&dir);
        dir
    });

    let cache = ResourceCache::new(vec![dir.clone()]);
    let resource = cache.load_file("watched.png", LoadFlags::empty());
    if !resource.is_valid() {
        eprintln!("failed to load watched.png from {}", dir.display());
        std::process::exit(1);
    }
    let (width, height) = resource
        .with_payload(|p| match p {
            Payload::Image { width, height, .. } => (*width, *height),
            _ => (0, 0),
        })
        .unwrap();
    println!("loaded watched.png: {width}x{height}, generation={}", resource.generation());

    cache.watch(Duration::from_millis(200), LoadFlags::empty()).expect("start watcher");
    println!("watching {} for changes (touch watched.png to trigger a reload)...", dir.display());

    let start = Instant::now();
    let initial_generation = resource.generation();
    while resource.generation() == initial_generation && start.elapsed() < Duration::from_secs(10) {
        std::thread::sleep(Duration::from_millis(100));
    }

    if resource.generation() != initial_generation {
        println!("hot-reload observed: generation {} -> {}", initial_generation, resource.generation());
    } else {
        println!("no reload observed within 10s, exiting");
    }
}

fn tempfile_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("ferrox-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create demo dir");
    dir
}

fn seed_fixture(dir: &std::path::Path) {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([40, 80, 120, 255]));
    img.save(dir.join("watched.png")).expect("write fixture image");
}
