//! Renders bundled example pipelines as Graphviz output.

use clap::Parser;
use flowforge::components::{FileReader, FileWriter, Grep, StringSink, StringSource, Uppercase};
use flowforge::pipeline::Pipeline;
use flowforge::viz::to_dot;
use std::io::Write;
use std::process::{Command, Stdio};

#[derive(Debug, Parser)]
#[command(name = "flowforge-viz", about = "Render example pipelines as DOT/SVG/PNG")]
struct Args {
    /// Example pipeline to render.
    #[arg(long, default_value = "simple")]
    example: String,

    /// Output format: dot, svg, or png.
    #[arg(short = 'T', long = "format", default_value = "dot")]
    format: String,
}

fn main() {
    let args = Args::parse();

    let pipeline = match args.example.as_str() {
        "simple" => simple_pipeline(),
        "file" => file_processing_pipeline(),
        other => {
            eprintln!("Unknown example: {other}");
            std::process::exit(1);
        }
    };

    let dot = to_dot(&pipeline);

    if args.format == "dot" {
        println!("{dot}");
        return;
    }

    let status = Command::new("dot")
        .arg(format!("-T{}", args.format))
        .stdin(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            if let Some(stdin) = child.stdin.as_mut() {
                stdin.write_all(dot.as_bytes())?;
            }
            child.wait()
        });

    match status {
        Ok(status) if status.success() => {}
        Ok(_) | Err(_) => {
            eprintln!("Error running dot");
            std::process::exit(1);
        }
    }
}

fn simple_pipeline() -> Pipeline {
    let mut p = Pipeline::new("simple-example");
    p.add_component("source", StringSource::new("hello world"));
    p.add_component("upper", Uppercase::new());
    p.add_component("sink", StringSink::new());
    p.connect::<String>("source", "output", "upper", "input");
    p.connect::<String>("upper", "output", "sink", "input");
    p
}

fn file_processing_pipeline() -> Pipeline {
    let mut p = Pipeline::new("file-processing-example");
    p.add_component("reader", FileReader::new("input.txt"));
    p.add_component("grepper", Grep::new("flow"));
    p.add_component("upper", Uppercase::new());
    p.add_component("writer", FileWriter::new("output.txt"));
    p.connect::<String>("reader", "output", "grepper", "input");
    p.connect::<String>("grepper", "output", "upper", "input");
    p.connect::<String>("upper", "output", "writer", "input");
    p
}
