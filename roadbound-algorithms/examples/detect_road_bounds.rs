use anyhow::{bail, Result};
use roadbound_algorithms::find_road_bounds;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 3 {
        bail!("Usage: detect_road_bounds <INPUT_FILE> <OUTPUT_FILE>");
    }

    find_road_bounds(args[1].as_str(), args[2].as_str())
}
