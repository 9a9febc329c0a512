//! CLI tool for adding a table-of-contents slide to PowerPoint decks.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use toc_core::{
    canvas_size, project, Canvas, LayoutConstants, LayoutOptimizer, PlacedItem, SlideDeck,
};
use toc_pptx::{
    load_deck, slide_canvas, DirectoryRenderer, PlaceholderRenderer, SlideRenderer, TocAssembler,
};

/// Append a slide of linked thumbnails to a copy of a .pptx deck.
#[derive(Parser, Debug)]
#[command(name = "toc-build")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input presentation (.pptx)
    input: PathBuf,

    /// Slides to include, e.g. 1,3,5 (default: all)
    #[arg(short, long, value_delimiter = ',')]
    slides: Vec<usize>,

    /// Number of columns (default: chosen automatically)
    #[arg(short, long)]
    columns: Option<usize>,

    /// Spacing between thumbnails, in points
    #[arg(short, long, default_value = "20")]
    margin: f64,

    /// 0-based index of the slide whose layout the new slide uses
    #[arg(short, long, default_value = "0")]
    background: usize,

    /// Directory of pre-rendered slide_N.png / .jpg images
    #[arg(short, long)]
    thumbnails: Option<PathBuf>,

    /// Print the computed layout as JSON instead of writing a file
    #[arg(short, long)]
    preview: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// JSON shape of `--preview` output.
#[derive(Serialize)]
struct Preview {
    slide: Canvas,
    surface: Canvas,
    items: Vec<PlacedItem>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let renderer: Box<dyn SlideRenderer> = match &args.thumbnails {
        Some(dir) => Box::new(DirectoryRenderer::new(dir)),
        None => Box::new(PlaceholderRenderer),
    };

    let deck = prepare_deck(&args, renderer.as_ref())?;
    let selected = deck.selected();

    if args.preview {
        let optimizer = LayoutOptimizer::new();
        let slide = slide_canvas(renderer.as_ref(), &args.input);
        let items = project(&optimizer, &selected, args.columns, args.margin, slide)
            .context("Failed to compute layout")?;
        let preview = Preview {
            slide,
            surface: canvas_size(&items, LayoutConstants::default().caption_height),
            items,
        };
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    let output = TocAssembler::new()
        .assemble(
            &args.input,
            &selected,
            args.columns,
            args.margin,
            deck.background_index(),
            renderer.as_ref(),
        )
        .with_context(|| {
            format!("Failed to build table of contents for {}", args.input.display())
        })?;

    println!("{}", output.display());
    Ok(())
}

/// Load the deck and apply the slide selection and background choice.
fn prepare_deck(args: &Args, renderer: &dyn SlideRenderer) -> Result<SlideDeck> {
    let mut deck = load_deck(&args.input, renderer)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    if args.verbose {
        eprintln!("Found {} slides in {}", deck.slides.len(), display_name(&args.input));
    }

    if !args.slides.is_empty() {
        let count = deck.slides.len();
        deck.select_all(false);
        for &number in &args.slides {
            match deck.slides.iter_mut().find(|s| s.number == number) {
                Some(slide) => slide.selected = true,
                None => bail!("Slide {} does not exist (deck has {} slides)", number, count),
            }
        }
    }

    deck.set_background(args.background)?;

    if !deck.has_selection() {
        bail!("No slides selected");
    }
    Ok(deck)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}
