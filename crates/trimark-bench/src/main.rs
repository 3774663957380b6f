//! trimark runner.
//!
//! Drives the triangle stage through the windowed runtime: every frame it
//! applies one tuning step toward the target count, renders, and reports
//! throughput once a second.

use anyhow::{Context, Result};

use trimark_engine::core::{App, AppControl, FrameCtx};
use trimark_engine::logging::{init_logging, LoggingConfig};
use trimark_engine::stage::{Stage, StageOptions, TriangleStage, CLEAR_COLOR};
use trimark_engine::window::{Runtime, RuntimeConfig};

const USAGE: &str = "\
trimark — GPU draw-submission throughput benchmark

USAGE:
    trimark-bench [OPTIONS]

OPTIONS:
    --attributes       feed triangle parameters through vertex attributes
    --ubos             feed triangle parameters through uniform blocks
    --multi-draw       batch draws into indirect multi-draw submissions
    --api-level <1|2>  emulated context tier (2 unlocks --ubos) [default: 1]
    --target <N>       triangle count to ramp toward [default: 50000]
    --step <N>         max per-frame tuning delta [default: 1000]
    --duration <SECS>  exit after this many seconds
    --seed <N>         deterministic instance parameters
    -h, --help         print this help
";

#[derive(Debug, Clone)]
struct RunOptions {
    stage: StageOptions,
    target: i64,
    step: i64,
    duration: Option<f32>,
    seed: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stage: StageOptions::default(),
            target: 50_000,
            step: 1_000,
            duration: None,
            seed: None,
        }
    }
}

fn parse_next<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
) -> Result<T> {
    let raw = args
        .next()
        .with_context(|| format!("{flag} expects a value"))?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("invalid value for {flag}: {raw}"))
}

fn parse_args() -> Result<RunOptions> {
    let mut opts = RunOptions::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--attributes" => opts.stage.use_attributes = true,
            "--ubos" => opts.stage.use_ubos = true,
            "--multi-draw" => opts.stage.use_multi_draw = true,
            "--api-level" => opts.stage.api_level = parse_next(&mut args, "--api-level")?,
            "--target" => opts.target = parse_next(&mut args, "--target")?,
            "--step" => opts.step = parse_next(&mut args, "--step")?,
            "--duration" => opts.duration = Some(parse_next(&mut args, "--duration")?),
            "--seed" => opts.seed = Some(parse_next(&mut args, "--seed")?),
            "-h" | "--help" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {other} (see --help)"),
        }
    }

    anyhow::ensure!(
        matches!(opts.stage.api_level, 1 | 2),
        "--api-level must be 1 or 2"
    );
    anyhow::ensure!(opts.target >= 0, "--target must be non-negative");
    anyhow::ensure!(opts.step > 0, "--step must be positive");

    Ok(opts)
}

struct BenchApp {
    stage: TriangleStage,
    target: i64,
    step: i64,
    duration: Option<f32>,

    announced: bool,
    frames: u32,
    report_accum: f32,
}

impl BenchApp {
    fn new(opts: &RunOptions) -> Self {
        let stage = match opts.seed {
            Some(seed) => TriangleStage::with_seed(opts.stage, seed),
            None => TriangleStage::new(opts.stage),
        };

        Self {
            stage,
            target: opts.target,
            step: opts.step,
            duration: opts.duration,
            announced: false,
            frames: 0,
            report_accum: 0.0,
        }
    }
}

impl App for BenchApp {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if let Some(limit) = self.duration {
            if ctx.time.elapsed >= limit {
                log::info!(
                    "run complete: {} triangles live after {:.1}s",
                    self.stage.complexity(),
                    ctx.time.elapsed
                );
                return AppControl::Exit;
            }
        }

        // One tuning step toward the target, then render: tune before
        // animate, once each per frame.
        let live = self.stage.complexity() as i64;
        let delta = (self.target - live).clamp(-self.step, self.step);
        self.stage.tune(delta);

        let time = ctx.time;
        let stage = &mut self.stage;
        let control = ctx.render(CLEAR_COLOR, |rctx, target| {
            stage.animate(rctx, target, time);
        });

        if !self.announced {
            if let Some(flags) = self.stage.resolved() {
                log::info!(
                    "strategy: {:?}, multi-draw: {}",
                    flags.strategy,
                    flags.multi_draw
                );
                self.announced = true;
            }
        }

        self.frames += 1;
        self.report_accum += time.dt;
        if self.report_accum >= 1.0 {
            let fps = self.frames as f32 / self.report_accum;
            log::info!("{} triangles · {fps:.1} fps", self.stage.complexity());
            ctx.window.set_title(&format!(
                "trimark — {} triangles · {fps:.0} fps",
                self.stage.complexity()
            ));
            self.frames = 0;
            self.report_accum = 0.0;
        }

        control
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let opts = parse_args()?;
    log::info!(
        "requested flags: attributes={}, ubos={}, multi_draw={}, api_level={}",
        opts.stage.use_attributes,
        opts.stage.use_ubos,
        opts.stage.use_multi_draw,
        opts.stage.api_level
    );

    let gpu_init = opts.stage.gpu_init();
    let app = BenchApp::new(&opts);

    Runtime::run(
        RuntimeConfig {
            title: "trimark".to_string(),
            ..Default::default()
        },
        gpu_init,
        app,
    )
}
