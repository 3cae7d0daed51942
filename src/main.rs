use clap::Parser;
use waypoint::cli::{commands, Args};
use waypoint::core::config::WaypointConfig;
use waypoint::logging;

fn main() {
    let args = Args::parse();
    let config = WaypointConfig::load_or_default(args.config.as_deref());

    if let Err(error) = logging::init(&args, &config) {
        eprintln!("failed to initialize logging: {}", error);
        std::process::exit(1);
    }

    match commands::run(&args, &config) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    }
}
