use console::Style;
use skyshield_core::detection::DetectorMethod;
use skyshield_core::odc::FitStatus;
use skyshield_core::pipeline::{PipelineConfig, PipelineOutcome};
use skyshield_core::validation::FrameMetrics;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn rule(len: usize) -> String {
    "\u{2550}".repeat(len)
}

pub fn print_run_summary(config: &PipelineConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("SkyShield Run"));
    println!("  {}", s.title.apply_to(rule(13)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Dataset"),
        s.value.apply_to(config.resolved_dataset_id())
    );
    println!();

    println!("  {}", s.header.apply_to("Detection"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Method"),
        s.method.apply_to(config.detection.method)
    );
    match config.detection.method {
        DetectorMethod::Percentile => {
            let p = &config.detection.percentile;
            println!(
                "    {:<12}{}",
                s.label.apply_to("Percentile"),
                s.value.apply_to(p.percentile)
            );
            println!(
                "    {:<12}{}",
                s.label.apply_to("Min Aspect"),
                s.value.apply_to(p.min_aspect_ratio)
            );
            println!(
                "    {:<12}{}",
                s.label.apply_to("Min Length"),
                s.value.apply_to(format!("{} px", p.min_length))
            );
        }
        DetectorMethod::Hough => {
            let h = &config.detection.hough;
            println!(
                "    {:<12}{}",
                s.label.apply_to("Angles"),
                s.value.apply_to(h.angle_steps)
            );
            println!(
                "    {:<12}{}",
                s.label.apply_to("Max Lines"),
                s.value.apply_to(h.max_lines)
            );
        }
    }
    println!();

    println!("  {}", s.header.apply_to("ODC"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bootstrap"),
        s.value.apply_to(config.odc.bootstrap_samples)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Seed"),
        s.value.apply_to(config.odc.seed)
    );
    if config.sky_model.enabled {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Sky Model"),
            s.method.apply_to("KS91")
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Sky Model"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();
}

pub fn print_outcome(outcome: &PipelineOutcome) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Night"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(outcome.night.n_frames)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Affected"),
        s.value.apply_to(outcome.night.affected_frames)
    );
    match outcome.night.median_streak_area_fraction {
        Some(median) => println!(
            "    {:<12}{}",
            s.label.apply_to("Median Area"),
            s.value.apply_to(format!("{:.4}%", median * 100.0))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Median Area"),
            s.disabled.apply_to("n/a")
        ),
    }
    if !outcome.failures.is_empty() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Failed"),
            s.disabled.apply_to(outcome.failures.len())
        );
        for failure in &outcome.failures {
            println!(
                "      {} {}",
                s.path.apply_to(failure.path.display()),
                s.label.apply_to(&failure.error)
            );
        }
    }
    println!();

    let odc = &outcome.odc;
    println!("  {}", s.header.apply_to("ODC"));
    let status = match odc.status() {
        FitStatus::Ok => s.method.apply_to(odc.status().to_string()),
        _ => s.disabled.apply_to(odc.status().to_string()),
    };
    println!("    {:<12}{}", s.label.apply_to("Status"), status);
    println!(
        "    {:<12}{}",
        s.label.apply_to("Method"),
        s.method.apply_to(&odc.method)
    );
    match (odc.odc_percent, odc.odc_ci95) {
        (Some(value), Some([lo, hi])) => println!(
            "    {:<12}{}",
            s.label.apply_to("Estimate"),
            s.value.apply_to(format!("{value:.2}% [{lo:.2}, {hi:.2}]"))
        ),
        (Some(value), None) => println!(
            "    {:<12}{}",
            s.label.apply_to("Estimate"),
            s.value.apply_to(format!("{value:.2}%"))
        ),
        _ => println!(
            "    {:<12}{}",
            s.label.apply_to("Estimate"),
            s.disabled.apply_to("n/a")
        ),
    }
    for note in &odc.quality.notes {
        println!("      {}", s.label.apply_to(note));
    }
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Night"),
        s.path.apply_to(outcome.night_summary_path.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("ODC"),
        s.path.apply_to(outcome.odc_report_path.display())
    );
}

pub fn print_metrics(metrics: &FrameMetrics) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Validation"));
    println!("  {}", s.title.apply_to(rule(10)));
    println!();

    for (label, value) in [
        ("IoU", metrics.iou),
        ("Precision", metrics.precision),
        ("Recall", metrics.recall),
        ("F1", metrics.f1),
    ] {
        println!(
            "  {:<14}{}",
            s.label.apply_to(label),
            s.value.apply_to(format!("{value:.4}"))
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("TP/FP/FN"),
        s.value.apply_to(format!("{}/{}/{}", metrics.tp, metrics.fp, metrics.fn_))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Streaks"),
        s.value.apply_to(format!(
            "{} predicted, {} true",
            metrics.num_pred_streaks, metrics.num_gt_streaks
        ))
    );
    if let Some(recall) = metrics.streak_recall {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Streak Recall"),
            s.value.apply_to(format!("{recall:.4}"))
        );
    }
}
