//! `modelview [MODEL] [--shaders DIR] [--settings FILE]`

use modelview::viewer::{self, ViewerOptions};
use std::path::PathBuf;
use std::process;

fn usage() -> ! {
    eprintln!("usage: modelview [MODEL] [--shaders DIR] [--settings FILE]");
    process::exit(2);
}

fn parse_args(mut args: impl Iterator<Item = String>) -> ViewerOptions {
    let mut options = ViewerOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--shaders" => options.shader_dir = PathBuf::from(args.next().unwrap_or_else(|| usage())),
            "--settings" => options.settings = PathBuf::from(args.next().unwrap_or_else(|| usage())),
            "-h" | "--help" => usage(),
            flag if flag.starts_with("--") => {
                eprintln!("unknown option {}", flag);
                usage()
            }
            _ if options.model.is_none() => options.model = Some(PathBuf::from(arg)),
            _ => usage(),
        }
    }

    options
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args(std::env::args().skip(1));
    if let Err(e) = viewer::run(&options) {
        log::error!("{}", e);
        process::exit(1);
    }
}
