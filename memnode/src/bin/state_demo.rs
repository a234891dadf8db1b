//! Stateful graph demo
//!
//! Builds `x -> MemoryOutput(s0)` and `MemoryInput(s0) -> y`, then runs one
//! iteration per input line. Each line holds the values of `x`; the printed
//! `y` is the `x` of the previous line.
//!
//! Usage: `state_demo [config.json] < lines`

use std::fs::File;
use std::io::{self, BufRead};

use memnode::io::{bytes_to_f32, f32_to_bytes};
use memnode::{EngineConfig, Graph, LayerDesc, MemoryDesc, Precision};
use tracing_subscriber::EnvFilter;

const WIDTH: usize = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_reader(File::open(path)?)?,
        None => EngineConfig::default(),
    };

    let desc = MemoryDesc::new(vec![WIDTH], Precision::F32);
    let mut graph = Graph::new(config);
    let x = graph.add_layer(&LayerDesc::input("x", desc.clone()))?;
    let writer = graph.add_layer(&LayerDesc::memory_output("s0_out", "s0"))?;
    let reader = graph.add_layer(&LayerDesc::memory_input("s0_in", "s0", desc))?;
    let y = graph.add_layer(&LayerDesc::output("y"))?;
    graph.connect(x, writer)?;
    graph.connect(reader, y)?;
    graph.prepare()?;

    print!("{}", graph.dump());
    println!("Enter {WIDTH} numbers per line (empty line to quit):");

    for line in io::stdin().lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        let values = trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::parse::<f32>)
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() != WIDTH {
            eprintln!("expected {WIDTH} numbers, got {}", values.len());
            continue;
        }

        graph.push_input("x", &f32_to_bytes(&values))?;
        graph.infer()?;
        let state = bytes_to_f32(&graph.output("y")?);
        println!("iteration {}: y = {state:?}", graph.iteration());
    }

    Ok(())
}
