// The swen reference host
//
// Reads a swen document, sets up the compositor core with the
// headless backend, and drives the pump_events/render_frame loop.
//
// Austin Shafer - 2025
extern crate nimbus;
extern crate squall;

use nimbus::Nimbus;
use squall::HeadlessBackend;

use std::process::exit;

fn main() {
    let mut args = std::env::args().skip(1);
    let path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: swen <file.swen> [frames]");
            exit(2);
        }
    };
    let frames: u64 = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(1);

    let src = match std::fs::read_to_string(&path) {
        Ok(src) => src,
        Err(err) => {
            eprintln!("swen: could not read {}: {}", path, err);
            exit(1);
        }
    };

    let mut swen = Nimbus::new(HeadlessBackend::new());
    if let Err(err) = swen.load_str(&src) {
        eprintln!("swen: {}: {}", path, err);
        exit(1);
    }

    println!("Begin render loop...");
    for _ in 0..frames {
        for event in swen.pump_events() {
            println!("event: {:?}", event);
        }

        match swen.render_frame() {
            Ok(result) => println!(
                "frame: {} tiles, {} draw calls, submitted in {} ns",
                result.tiles_rendered, result.draw_calls, result.submit_time_ns
            ),
            Err(err) => {
                eprintln!("swen: render failed: {:?}", err);
                exit(1);
            }
        }
    }
}
