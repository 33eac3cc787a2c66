use clap::{Parser, Subcommand};
use matgen_core::{Graph, IOSignature, NodeId, ShaderGenerator};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "matgen")]
#[command(about = "Generate HLSL from a material node-graph description", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shader source from a graph file
    Generate {
        /// Input graph description (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output HLSL file (defaults to input name with .hlsl extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Elide single-use temporaries
        #[arg(long)]
        inline: bool,

        /// Fail on unresolved pins instead of emitting 0 literals
        #[arg(long)]
        strict: bool,

        /// Print verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a graph file without writing output
    Check {
        /// Input graph description (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

/// On-disk description of one generation request.
#[derive(Deserialize)]
struct GraphFile {
    entry: String,
    root: NodeId,
    #[serde(default)]
    define_input_struct: bool,
    #[serde(default)]
    define_output_struct: bool,
    input: IOSignature,
    output: IOSignature,
    graph: Graph,
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Graph file error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Generation error: {0}")]
    GenerationError(#[from] matgen_core::GeneratorError),
}

fn main() -> Result<(), DriverError> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { input, output, inline, strict, verbose } => {
            generate_file(input, output, inline, strict, verbose)?;
        }
        Commands::Check { input, verbose } => {
            check_file(input, verbose)?;
        }
    }

    Ok(())
}

fn load(input: &PathBuf) -> Result<GraphFile, DriverError> {
    let text = fs::read_to_string(input)?;
    Ok(serde_json::from_str(&text)?)
}

fn generate_file(
    input: PathBuf,
    output: Option<PathBuf>,
    inline: bool,
    strict: bool,
    verbose: bool,
) -> Result<(), DriverError> {
    if verbose {
        println!("Generating from {}...", input.display());
    }

    let file = load(&input)?;

    let mut generator = ShaderGenerator::new();
    generator.inline = inline;
    generator.strict = strict;
    let generated = generator.generate(
        &file.graph,
        file.root,
        &file.entry,
        file.define_input_struct,
        file.define_output_struct,
        &file.input,
        &file.output,
    )?;

    let output_path = output.unwrap_or_else(|| {
        let mut path = input.clone();
        path.set_extension("hlsl");
        path
    });
    fs::write(&output_path, &generated.source)?;

    if verbose {
        println!("Wrote {}", output_path.display());
        for (node, slot) in &generated.texture_slots {
            println!("texture node {:?} -> t{}", node, slot);
        }
        for (node, slot) in &generated.sampler_slots {
            println!("sampler node {:?} -> s{}", node, slot);
        }
    }

    Ok(())
}

fn check_file(input: PathBuf, verbose: bool) -> Result<(), DriverError> {
    if verbose {
        println!("Checking {}...", input.display());
    }

    let file = load(&input)?;

    // Validation runs the full pipeline in strict mode, discarding the text.
    let mut generator = ShaderGenerator::new();
    generator.strict = true;
    let _generated = generator.generate(
        &file.graph,
        file.root,
        &file.entry,
        file.define_input_struct,
        file.define_output_struct,
        &file.input,
        &file.output,
    )?;

    if verbose {
        println!("{} is valid", input.display());
    }

    Ok(())
}
