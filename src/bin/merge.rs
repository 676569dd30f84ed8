use std::path::PathBuf;
use std::time::Instant;
use std::{env, process};

use gbwt::{GBWT, MergeParameters, utils};
use gbwt::merge::merge;

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();
    let config = Config::new()?;

    let first = GBWT::open(&config.first).map_err(|x| x.to_string())?;
    let second = GBWT::open(&config.second).map_err(|x| x.to_string())?;
    if config.params.progress {
        eprintln!(
            "Loaded {} and {} sequences from the inputs",
            first.sequences(), second.sequences()
        );
    }

    let merged = merge(&first, &second, &config.params).map_err(|x| x.to_string())?;
    merged.save(&config.output_file).map_err(|x| x.to_string())?;

    if config.params.progress {
        if let Some(size) = utils::file_size(&config.output_file) {
            eprintln!("Index size: {}", size);
        }
        eprintln!("Total time: {:.3} seconds", start_time.elapsed().as_secs_f64());
    }

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    first: PathBuf,
    second: PathBuf,
    output_file: PathBuf,
    params: MergeParameters,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] -o output.gbwt first.gbwt second.gbwt", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("o", "output", "output file name (required)", "FILE");
        opts.optopt(
            "b",
            "pos-buffer",
            &format!("producer buffer size in MB (default: {})", MergeParameters::POS_BUFFER_SIZE),
            "INT",
        );
        opts.optopt(
            "t",
            "thread-buffer",
            &format!("bucketing buffer size in MB (default: {})", MergeParameters::THREAD_BUFFER_SIZE),
            "INT",
        );
        opts.optopt(
            "m",
            "merge-buffers",
            &format!("number of queued buffers (default: {})", MergeParameters::MERGE_BUFFERS),
            "INT",
        );
        opts.optopt(
            "c",
            "chunk-size",
            &format!("sequences per producer chunk (default: {})", MergeParameters::CHUNK_SIZE),
            "INT",
        );
        opts.optopt(
            "j",
            "jobs",
            &format!("number of worker threads (default: {})", MergeParameters::MERGE_JOBS),
            "INT",
        );
        opts.optflag("p", "progress", "print progress information to stderr");

        let matches = match opts.parse(&args[1..]) {
            Ok(matches) => matches,
            Err(err) => {
                eprintln!("{}", err);
                process::exit(1);
            }
        };
        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }

        let (first, second) = match matches.free.len() {
            2 => (PathBuf::from(&matches.free[0]), PathBuf::from(&matches.free[1])),
            _ => {
                eprint!("{}", opts.usage(&header));
                process::exit(1);
            }
        };
        let output_file = match matches.opt_str("o") {
            Some(name) => PathBuf::from(name),
            None => return Err(String::from("Option --output is required")),
        };

        let mut params = MergeParameters::default();
        if let Some(value) = matches.opt_str("b") {
            params.pos_buffer_size = value.parse::<usize>().map_err(|x| format!("--pos-buffer: {}", x))?;
        }
        if let Some(value) = matches.opt_str("t") {
            params.thread_buffer_size = value.parse::<usize>().map_err(|x| format!("--thread-buffer: {}", x))?;
        }
        if let Some(value) = matches.opt_str("m") {
            params.merge_buffers = value.parse::<usize>().map_err(|x| format!("--merge-buffers: {}", x))?;
        }
        if let Some(value) = matches.opt_str("c") {
            params.chunk_size = value.parse::<usize>().map_err(|x| format!("--chunk-size: {}", x))?;
        }
        if let Some(value) = matches.opt_str("j") {
            params.merge_jobs = value.parse::<usize>().map_err(|x| format!("--jobs: {}", x))?;
        }
        params.progress = matches.opt_present("p");
        params.validate().map_err(|x| x.to_string())?;

        Ok(Config { first, second, output_file, params })
    }
}

//-----------------------------------------------------------------------------
