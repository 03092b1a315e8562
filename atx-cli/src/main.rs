use atx_transform::{AccessTransformSet, format, manifest, transform_class};
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "atx", about = "JVM access transformer toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge access transformer files and print them normalized
    Fmt {
        /// Access transformer files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Merge access transformer files and print the result as YAML
    Dump {
        /// Access transformer files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Apply access transformers to a .class file
    Apply {
        /// Access transformer file (repeatable)
        #[arg(long = "at", required = true)]
        transformers: Vec<PathBuf>,
        /// Path to the .class file
        input: PathBuf,
        /// Output path (default: rewrite the input in place)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only report whether the class would change; exits with 1 if it would
        #[arg(long, conflicts_with = "output")]
        check: bool,
    },
    /// List the access transformer paths a jar manifest names, or the
    /// conventional META-INF/accesstransformer.cfg when it names none
    Manifest {
        /// Path to a MANIFEST.MF
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fmt { files } => cmd_fmt(&files),
        Commands::Dump { files } => cmd_dump(&files),
        Commands::Apply {
            transformers,
            input,
            output,
            check,
        } => cmd_apply(&transformers, &input, output.as_deref(), check),
        Commands::Manifest { input } => cmd_manifest(&input),
    }
}

fn load_transformers(paths: &[PathBuf]) -> AccessTransformSet {
    let mut set = AccessTransformSet::new();
    for path in paths {
        let file = File::open(path).unwrap_or_else(|e| {
            eprintln!("Error opening {}: {e}", path.display());
            std::process::exit(1);
        });
        format::read(BufReader::new(file), &mut set).unwrap_or_else(|e| {
            eprintln!("Error reading {}: {e}", path.display());
            std::process::exit(1);
        });
    }
    log::debug!(
        "loaded {} classes from {} access transformer files",
        set.len(),
        paths.len()
    );
    set
}

fn cmd_fmt(files: &[PathBuf]) {
    let set = load_transformers(files);
    print!("{set}");
}

fn cmd_dump(files: &[PathBuf]) {
    let set = load_transformers(files);
    match serde_yaml::to_string(&set) {
        Ok(yaml) => print!("{yaml}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_apply(transformers: &[PathBuf], input: &Path, output: Option<&Path>, check: bool) {
    let set = load_transformers(transformers);

    let file = File::open(input).unwrap_or_else(|e| {
        eprintln!("Error opening {}: {e}", input.display());
        std::process::exit(1);
    });
    // SAFETY: the mapping is read-only and dropped before anything writes to
    // the file.
    let data = match unsafe { memmap2::Mmap::map(&file) } {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error mapping {}: {e}", input.display());
            std::process::exit(1);
        }
    };

    let transformed = match transform_class(&data, &set) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: {}: {e}", input.display());
            std::process::exit(1);
        }
    };
    let changed = transformed[..] != data[..];
    drop(data);
    drop(file);

    if check {
        if changed {
            println!("{}: would be modified", input.display());
            std::process::exit(1);
        }
        return;
    }

    let out_path = output.unwrap_or(input);
    if !changed && out_path == input {
        log::info!("{}: unchanged", input.display());
        return;
    }
    fs::write(out_path, &transformed).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {e}", out_path.display());
        std::process::exit(1);
    });
}

fn cmd_manifest(input: &Path) {
    let text = fs::read_to_string(input).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", input.display());
        std::process::exit(1);
    });
    let paths = manifest::access_transformer_paths(&text);
    if paths.is_empty() {
        println!("{}", manifest::ACCESS_TRANSFORMER_PATH);
    }
    for path in paths {
        println!("{path}");
    }
}
