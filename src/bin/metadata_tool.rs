use std::path::PathBuf;
use std::{env, process};

use gbwt::{GBWT, utils};

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let config = Config::new()?;

    let index = GBWT::open(&config.index_file).map_err(|x| x.to_string())?;
    println!("File: {}", config.index_file.display());
    if let Some(size) = utils::file_size(&config.index_file) {
        println!("Size: {}", size);
    }
    println!("Sequences: {}", index.sequences());
    println!("Alphabet size: {}", index.alphabet_size());
    println!("Nodes: {}", index.node_count());
    println!("Sample interval: {}", index.sample_interval());
    println!("Bidirectional: {}", index.is_bidirectional());

    match index.metadata() {
        Some(metadata) => {
            println!("Metadata: {}", metadata);
            if config.list_samples {
                for i in 0..metadata.samples() {
                    match metadata.sample_name(i) {
                        Some(name) => println!("Sample {}: {}", i, name),
                        None => println!("Sample {}", i),
                    }
                }
            }
            if config.list_contigs {
                for i in 0..metadata.contigs() {
                    match metadata.contig_name(i) {
                        Some(name) => println!("Contig {}: {}", i, name),
                        None => println!("Contig {}", i),
                    }
                }
            }
            if config.list_paths {
                for i in 0..metadata.paths() {
                    if let Some(path) = metadata.path(i) {
                        println!(
                            "Path {}: sample {}, contig {}, phase {}, count {}",
                            i, path.sample, path.contig, path.phase, path.count
                        );
                    }
                }
            }
        }
        None => println!("Metadata: none"),
    }

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    index_file: PathBuf,
    list_samples: bool,
    list_contigs: bool,
    list_paths: bool,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] index.gbwt", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optflag("s", "samples", "list the sample names");
        opts.optflag("c", "contigs", "list the contig names");
        opts.optflag("P", "paths", "list the path names");

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

        Ok(Config {
            index_file,
            list_samples: matches.opt_present("s"),
            list_contigs: matches.opt_present("c"),
            list_paths: matches.opt_present("P"),
        })
    }
}

//-----------------------------------------------------------------------------
