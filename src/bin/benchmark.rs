use std::path::PathBuf;
use std::time::Instant;
use std::{env, process};

use gbwt::{GBWT, CachedGBWT, SequenceIndex};

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let config = Config::new()?;

    let start = Instant::now();
    let index = GBWT::open(&config.index_file).map_err(|x| x.to_string())?;
    eprintln!(
        "Loaded an index with {} sequences over {} nodes in {:.3} seconds",
        index.sequences(), index.node_count(), start.elapsed().as_secs_f64()
    );

    // Queries are windows of the stored sequences, so every one of them has
    // at least one match.
    let mut patterns: Vec<Vec<usize>> = Vec::new();
    for sequence in 0..index.sequences().min(config.max_sequences) {
        let path = index.extract(sequence);
        if path.len() < config.pattern_len {
            continue;
        }
        let mut start = 0;
        while start + config.pattern_len <= path.len() && patterns.len() < config.max_patterns {
            patterns.push(path[start..start + config.pattern_len].to_vec());
            start += config.pattern_len;
        }
    }
    if patterns.is_empty() {
        return Err(String::from("No patterns could be extracted from the index"));
    }
    eprintln!("Extracted {} patterns of length {}", patterns.len(), config.pattern_len);

    // find() on the plain index.
    let start = Instant::now();
    let mut total_matches = 0;
    for pattern in patterns.iter() {
        total_matches += index.find(pattern).len();
    }
    let seconds = start.elapsed().as_secs_f64();
    eprintln!(
        "find(): {} queries with {} matches in {:.3} seconds ({:.0} queries/s)",
        patterns.len(), total_matches, seconds, patterns.len() as f64 / seconds
    );

    // find() on the cached index.
    let cached = CachedGBWT::new(&index);
    let start = Instant::now();
    let mut cached_matches = 0;
    for pattern in patterns.iter() {
        cached_matches += cached.find(pattern).len();
    }
    let seconds = start.elapsed().as_secs_f64();
    eprintln!(
        "find(), cached: {} queries in {:.3} seconds ({:.0} queries/s)",
        patterns.len(), seconds, patterns.len() as f64 / seconds
    );
    if cached_matches != total_matches {
        return Err(String::from("The cached index returned different results"));
    }

    // locate() over the matches.
    if index.has_samples() {
        let start = Instant::now();
        let mut located = 0;
        for pattern in patterns.iter() {
            let state = index.find(pattern);
            located += index.locate_all(&state).len();
        }
        let seconds = start.elapsed().as_secs_f64();
        eprintln!(
            "locate(): {} sequence identifiers in {:.3} seconds ({:.0} ids/s)",
            located, seconds, located as f64 / seconds
        );
    } else {
        eprintln!("locate(): skipped, the index has no samples");
    }

    // extract() over all sequences.
    let start = Instant::now();
    let mut total_nodes = 0;
    for sequence in 0..index.sequences() {
        total_nodes += index.extract(sequence).len();
    }
    let seconds = start.elapsed().as_secs_f64();
    eprintln!(
        "extract(): {} sequences with {} nodes in {:.3} seconds ({:.0} nodes/s)",
        index.sequences(), total_nodes, seconds, total_nodes as f64 / seconds
    );

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    index_file: PathBuf,
    pattern_len: usize,
    max_patterns: usize,
    max_sequences: usize,
}

impl Config {
    const PATTERN_LEN: usize = 10;
    const MAX_PATTERNS: usize = 100_000;
    const MAX_SEQUENCES: usize = 1000;

    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] index.gbwt", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt(
            "l",
            "pattern-len",
            &format!("length of the query patterns (default: {})", Self::PATTERN_LEN),
            "INT",
        );
        opts.optopt(
            "n",
            "patterns",
            &format!("maximum number of patterns (default: {})", Self::MAX_PATTERNS),
            "INT",
        );
        opts.optopt(
            "s",
            "sequences",
            &format!("number of sequences to draw patterns from (default: {})", Self::MAX_SEQUENCES),
            "INT",
        );

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

        let index_file = match matches.free.len() {
            1 => PathBuf::from(&matches.free[0]),
            _ => {
                eprint!("{}", opts.usage(&header));
                process::exit(1);
            }
        };
        let pattern_len = match matches.opt_str("l") {
            Some(value) => value.parse::<usize>().map_err(|x| format!("--pattern-len: {}", x))?,
            None => Self::PATTERN_LEN,
        };
        if pattern_len == 0 {
            return Err(String::from("--pattern-len must be greater than 0"));
        }
        let max_patterns = match matches.opt_str("n") {
            Some(value) => value.parse::<usize>().map_err(|x| format!("--patterns: {}", x))?,
            None => Self::MAX_PATTERNS,
        };
        let max_sequences = match matches.opt_str("s") {
            Some(value) => value.parse::<usize>().map_err(|x| format!("--sequences: {}", x))?,
            None => Self::MAX_SEQUENCES,
        };

        Ok(Config { index_file, pattern_len, max_patterns, max_sequences })
    }
}

//-----------------------------------------------------------------------------
