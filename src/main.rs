// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use clap::Parser;

use gridsynth::bundle::{self, GridSpec};
use gridsynth::compose::{compose_pieces, ComposeOptions, IdentityFill};
use gridsynth::evaluate::{evaluate, select_answers};
use gridsynth::pieces::build_pieces;

/// Composes pre-built derivation graphs into candidate output grids and
/// prints the best-scoring distinct answers.
#[derive(Parser, Debug)]
struct Args {
    /// Path to the task bundle JSON.
    input: String,

    /// Number of distinct answers to keep.
    #[arg(long, default_value_t = 3)]
    keep: usize,

    /// Emit the selected answers as JSON instead of text grids.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let _ = env_logger::builder().try_init();
    let args = Args::parse();

    let task = bundle::load_task(Path::new(&args.input))?;
    log::info!(
        "loaded task: {} graphs, {} training pairs",
        task.graphs.len(),
        task.train.len()
    );

    let set = build_pieces(task.graphs, &task.costs);
    log::info!("pieces: {}", set.pieces.len());

    let cands = compose_pieces(
        &set,
        &task.train,
        &task.out_sizes,
        &IdentityFill,
        &ComposeOptions::default(),
    );
    log::info!("candidates: {}", cands.len());

    let scored = evaluate(&cands, &task.train);
    let answers = select_answers(&scored, args.keep);

    if args.json {
        let grids: Vec<(GridSpec, f64)> = answers
            .iter()
            .map(|a| (GridSpec::from_image(&a.imgs[a.imgs.len() - 1]), a.score))
            .collect();
        println!("{}", serde_json::to_string_pretty(&grids)?);
    } else if answers.is_empty() {
        println!("no answer found");
    } else {
        for (rank, answer) in answers.iter().enumerate() {
            let img = &answer.imgs[answer.imgs.len() - 1];
            println!("#{} (score {:.5}):", rank + 1, answer.score);
            for i in 0..img.h {
                let row: String = (0..img.w)
                    .map(|j| char::from_digit(img.pixel(i, j) as u32, 10).unwrap_or('?'))
                    .collect();
                println!("  {row}");
            }
        }
    }
    Ok(())
}
