mod cli;
mod error_fmt;
#[cfg(unix)]
mod rt;
mod run;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::{RunArgs, RunSummary};
use clap::Parser;
use eyre::WrapErr;
use rotor_config::{Config, Logging};
use rotor_core::util::rate_hz;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

fn main() -> ExitCode {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    match real_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "rotor failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            ExitCode::from(u8::try_from(exit_code_for_error(&e)).unwrap_or(1))
        }
    }
}

fn load_config(cli: &Cli) -> eyre::Result<Config> {
    match &cli.config {
        Some(path) => rotor_config::load_file(path),
        None => {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }
}

/// Console layer on stderr (pretty or JSON) plus an optional JSON-lines file.
fn init_tracing(json: bool, level: Option<&str>, logging: &Logging) -> eyre::Result<()> {
    let level = level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    });

    if let Some(file) = &logging.file {
        let path = std::path::Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            "never" => tracing_appender::rolling::never(dir, name),
            other => {
                eyre::bail!("logging.rotation must be never, daily or hourly (got {other:?})")
            }
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .wrap_err("install tracing subscriber")
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli);
    // Logging comes up even for a bad config, so the failure is logged too.
    let logging = cfg.as_ref().map(|c| &c.logging).ok();
    init_tracing(
        cli.json,
        cli.log_level.as_deref(),
        logging.unwrap_or(&Logging::default()),
    )?;
    let cfg = cfg?;

    match cli.cmd {
        Commands::CheckConfig => {
            if cli.json {
                println!("{}", serde_json::json!({ "status": "ok" }));
            } else {
                println!("config ok");
            }
            Ok(())
        }
        Commands::SelfCheck => {
            #[cfg(all(feature = "hardware", target_os = "linux"))]
            if let Some(pins) = cfg.pins {
                let enc = rotor_hardware::gpio::EncoderInputs::open(
                    pins.phase_a,
                    pins.phase_b,
                    pins.reference,
                )?;
                let (a, b) = enc.initial_phase();
                tracing::info!(phase_a = a, phase_b = b, "encoder pins readable");
            }
            let last = run::self_check(&cfg)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "ok",
                        "ground": last.ground,
                        "parked": last.parked,
                    })
                );
            } else {
                println!("self-check ok");
            }
            Ok(())
        }
        Commands::Run {
            cycles,
            height,
            yaw,
            pot,
            trace,
            record,
            threaded,
            rt,
        } => {
            #[cfg(unix)]
            rt::setup_rt_once(&rt);
            #[cfg(not(unix))]
            if rt.rt {
                tracing::warn!("real-time mode is not supported on this OS");
            }

            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let s = Arc::clone(&shutdown);
                if let Err(e) = ctrlc::set_handler(move || s.store(true, Ordering::Release)) {
                    tracing::warn!(error = %e, "failed to install Ctrl-C handler");
                }
            }
            let args = RunArgs {
                cycles,
                height,
                yaw,
                pot,
                trace,
                record,
                threaded,
            };
            let summary = run::run_sim(&cfg, &args, &shutdown)?;
            print_summary(&summary, cli.json);
            Ok(())
        }
    }
}

fn print_summary(s: &RunSummary, json: bool) {
    let r = &s.last;
    if json {
        let line = serde_json::json!({
            "cycles": s.cycles,
            "target_height_index": r.target_height_index,
            "target_yaw_index": r.target_yaw_index,
            "ground": s.ground,
            "height": r.height_above_ground,
            "height_error": r.height_error,
            "yaw": r.yaw,
            "yaw_error": r.yaw_error,
            "main_duty": r.main_duty,
            "tail_duty": r.tail_duty,
            "parked": r.parked,
            "dt_ms": r.dt_ms,
            "loop_hz": rate_hz(r.dt_ms),
            "pot": s.pot,
            "reference_seen": s.reference_seen,
            "plant_height": s.plant_height,
            "plant_yaw": s.plant_yaw,
            "duration_ms": u64::try_from(s.duration_ms).unwrap_or(u64::MAX),
            "interrupted": s.interrupted,
        });
        println!("{line}");
        return;
    }
    let note = if s.interrupted { " (interrupted)" } else { "" };
    println!("cycles:   {}{note}", s.cycles);
    match s.ground {
        Some(g) => println!("ground:   {g}"),
        None => println!("ground:   not captured"),
    }
    println!(
        "height:   {} (target index {}, error {})",
        r.height_above_ground, r.target_height_index, r.height_error
    );
    println!(
        "yaw:      {} deg (target index {}, error {})",
        r.yaw, r.target_yaw_index, r.yaw_error
    );
    println!("duty:     main {}%  tail {}%", r.main_duty, r.tail_duty);
    println!("loop:     {} ms ({} Hz)", r.dt_ms, rate_hz(r.dt_ms));
    println!("pot:      {}", s.pot);
    println!("took {} ms", s.duration_ms);
}
