use std::io::BufRead;
use std::path::PathBuf;
use std::time::Instant;
use std::{env, process};

use gbwt::{DynamicGBWT, utils};

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();
    let config = Config::new()?;

    // Read the paths: one path per line, whitespace-separated node values.
    let mut reader = utils::open_file(&config.input_file)?;
    let mut paths: Vec<Vec<usize>> = Vec::new();
    let mut line = String::new();
    let mut line_num = 0;
    loop {
        line.clear();
        line_num += 1;
        let len = reader.read_line(&mut line).map_err(|x| x.to_string())?;
        if len == 0 {
            break;
        }
        let path: Result<Vec<usize>, _> = line.split_whitespace().map(|token| token.parse::<usize>()).collect();
        let path = path.map_err(|x| format!("Line {}: {}", line_num, x))?;
        paths.push(path);
    }
    if config.progress {
        eprintln!("Read {} paths from {}", paths.len(), config.input_file.display());
    }

    // Build and finalise the index.
    let index = DynamicGBWT::from_paths(&paths, config.sample_interval, config.bidirectional)
        .map_err(|x| x.to_string())?;
    let index = index.into_gbwt().map_err(|x| x.to_string())?;
    index.save(&config.output_file).map_err(|x| x.to_string())?;

    if config.progress {
        eprintln!(
            "Built an index with {} sequences over {} nodes",
            index.sequences(), index.node_count()
        );
        if let Some(size) = utils::file_size(&config.output_file) {
            eprintln!("Index size: {}", size);
        }
        eprintln!("Total time: {:.3} seconds", start_time.elapsed().as_secs_f64());
    }

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    input_file: PathBuf,
    output_file: PathBuf,
    sample_interval: usize,
    bidirectional: bool,
    progress: bool,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] -o output.gbwt paths.txt[.gz]", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("o", "output", "output file name (required)", "FILE");
        opts.optopt(
            "i",
            "interval",
            &format!(
                "sample interval for locate() support, 0 to disable (default: {})",
                DynamicGBWT::SAMPLE_INTERVAL
            ),
            "INT",
        );
        opts.optflag("b", "bidirectional", "insert the paths in both orientations");
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

        let input_file = match matches.free.len() {
            1 => PathBuf::from(&matches.free[0]),
            _ => {
                eprint!("{}", opts.usage(&header));
                process::exit(1);
            }
        };
        let output_file = match matches.opt_str("o") {
            Some(name) => PathBuf::from(name),
            None => return Err(String::from("Option --output is required")),
        };
        let sample_interval = match matches.opt_str("i") {
            Some(value) => value.parse::<usize>().map_err(|x| format!("--interval: {}", x))?,
            None => DynamicGBWT::SAMPLE_INTERVAL,
        };

        Ok(Config {
            input_file,
            output_file,
            sample_interval,
            bidirectional: matches.opt_present("b"),
            progress: matches.opt_present("p"),
        })
    }
}

//-----------------------------------------------------------------------------
