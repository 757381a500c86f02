use clap::Parser;
use mould::region::{scatter_fixed_cells, stamp_plateau};
use mould::{MouldBlur, MouldJobParams, ScratchMask, generate_base_terrain};
use std::path::PathBuf;

/// Демонстрация инструмента Mould: сглаживание области с фиксированными высотами
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к заданию в формате TOML
    #[arg(short, long)]
    config: PathBuf,

    /// Превью карты до сглаживания
    #[arg(long, default_value = "before.png")]
    before: PathBuf,

    /// Превью карты после сглаживания
    #[arg(short, long, default_value = "after.png")]
    output: PathBuf,

    /// Переопределяет число рабочих потоков из задания
    #[arg(short, long)]
    threads: Option<usize>,

    /// Куда записать сводку в JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    println!("🔍 Загрузка задания...");
    let job = MouldJobParams::from_toml_file(&cli.config)?;
    let region = job.region;
    let smooth_radius = job.settings.smooth_radius;

    println!(
        "Генерация рельефа (размер: {}×{})...",
        job.width, job.height
    );
    let mut terrain = generate_base_terrain(job.seed, job.width, job.height, &job.terrain);
    let before = terrain.clone();

    // Имитация рейкаста под кистью
    let mut mask = ScratchMask::for_region(&region);
    if let Some(plateau) = &job.plateau {
        stamp_plateau(&mut mask, plateau);
    }
    if let Some(scatter) = &job.scatter {
        scatter_fixed_cells(&mut mask, job.seed.wrapping_add(1_000), scatter);
    }

    let mut heights_a = terrain.extract_padded(&region, smooth_radius);
    let mut heights_b = heights_a.clone();

    let mut blur = MouldBlur::new(&job.settings);
    if let Some(threads) = cli.threads {
        blur = blur.with_parallelism(threads);
    }

    println!(
        "Сглаживание области {}×{} в ({}, {}), радиус {}...",
        region.width, region.height, region.x, region.y, smooth_radius
    );
    let report = blur.apply(&region, smooth_radius, &mask, &mut heights_a, &mut heights_b)?;
    terrain.write_region(&region, smooth_radius, &heights_a);

    println!(
        "Потоков: {}, строк на поток: {}, фиксировано клеток: {}",
        report.job_count, report.row_span, report.fixed_cells
    );

    // Общий диапазон, чтобы оттенки «до» и «после» совпадали
    let (min_b, max_b) = before.range().unwrap_or((0.0, 1.0));
    let (min_a, max_a) = terrain.range().unwrap_or((0.0, 1.0));
    let (min_h, max_h) = (min_b.min(min_a), max_b.max(max_a));

    println!("Сохранение в {:?} и {:?}", cli.before, cli.output);
    before.save_as_png_in_range(&cli.before, min_h, max_h)?;
    terrain.save_as_png_in_range(&cli.output, min_h, max_h)?;

    if let Some(path) = &cli.report {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }

    println!("\nГотово!");
    Ok(())
}
