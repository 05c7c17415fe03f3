use clap::Parser;
use iterator_acq::actions::{run_action, run_auto, ActionContext};
use iterator_acq::cancel::CancelFlag;
use iterator_acq::cli::Args;
use iterator_acq::compress::{bundle_name, compress_folder, BundleFormat};
use iterator_acq::config::{OutputLayout, Settings};
use iterator_acq::monitor::{IpNeighborSource, NetworkMonitor};
use iterator_acq::session::{self, SessionMode};
use iterator_acq::ui::{self, Console, MenuChoice};
use iterator_acq::{logging, AcqResult};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::block_in_place;

type MainResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn compress_output(
    layout: &OutputLayout,
    format: BundleFormat,
    case_name: &str,
    case_number: Option<&str>,
    quiet: bool,
) -> AcqResult<()> {
    let destination = match layout.root().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    let name = bundle_name(case_name, case_number, format);
    let progress = ui::compression_progress(format, quiet);
    let bundle = block_in_place(|| compress_folder(layout.root(), format, &destination, &name, &progress))?;
    if !quiet {
        ui::print_bundle(&bundle);
    }
    Ok(())
}

async fn interactive(
    ctx: &ActionContext,
    args: &Args,
    enforcement: Option<Arc<AtomicBool>>,
) -> MainResult {
    let console = Console::new();
    block_in_place(|| console.banner(&ctx.shell.describe(), &ctx.layout.root().display().to_string()))?;

    loop {
        if ctx.cancel.is_cancelled() {
            console.notice("Acquisition cancelled; leaving the menu")?;
            return Ok(());
        }
        let enforcing = enforcement
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false);

        match block_in_place(|| console.main_menu(enforcing))? {
            MenuChoice::AutoAcquisition => {
                for (id, result) in run_auto(ctx).await {
                    ui::print_action_result(id, &result);
                }
            }
            MenuChoice::ManualAction => {
                if let Some(id) = block_in_place(|| console.action_menu())? {
                    let result = run_action(id, ctx).await;
                    ui::print_action_result(id, &result);
                }
            }
            MenuChoice::Compress => {
                let format = block_in_place(|| console.format_menu())?;
                let case_number = match &args.case_number {
                    Some(number) => Some(number.clone()),
                    None => block_in_place(|| console.prompt("Case number (blank for none):", true))?,
                };
                if let Err(e) = compress_output(&ctx.layout, format, &args.case_name, case_number.as_deref(), false) {
                    log::error!(target: "compress", "Compression failed: {}", e);
                }
            }
            MenuChoice::ToggleEnforcement => match &enforcement {
                Some(flag) => {
                    let now = !flag.load(Ordering::SeqCst);
                    flag.store(now, Ordering::SeqCst);
                    log::warn!(
                        target: "network",
                        "Network enforcement turned {} by the operator",
                        if now { "on" } else { "off" }
                    );
                }
                None => console.notice("No network monitor runs for an emulated device")?,
            },
            MenuChoice::Exit => return Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> MainResult {
    let args = Args::parse();

    let mut settings = Settings::load(&args.settings)?;
    if !args.settings.exists() {
        settings.save(&args.settings)?;
    }
    args.apply_to(&mut settings);

    let layout = OutputLayout::new(settings.output_dir.clone());
    if args.clear_logs {
        let confirmed = args.yes
            || block_in_place(|| {
                Console::new().confirm(&format!("Clear logs and results under {}?", layout.root().display()))
            })?;
        if confirmed {
            layout.clear()?;
        }
    }
    layout.create_all()?;

    logging::init(logging::level_for(args.verbose, args.quiet), Some(layout.log_file().as_path()))?;
    log::info!("ITeratOr starting with args: {:?}", args);

    let mode = if args.physical {
        SessionMode::physical(args.watch.as_deref().unwrap_or_default())?
    } else if let Some(serial) = &args.serial {
        SessionMode::Attached { serial: serial.clone() }
    } else {
        SessionMode::Emulated
    };
    let session = session::establish(&settings, mode, &layout).await?;

    let cancel = CancelFlag::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received; stopping after the current stage");
            interrupt.cancel();
        }
    });

    let mut enforcement = None;
    let monitor = session.mode.watch_ip().map(|watch_ip| {
        let monitor = NetworkMonitor::new(
            Arc::new(IpNeighborSource::new(args.interface.clone())),
            watch_ip,
            settings.monitor_interval(),
            settings.network_enforcement,
            cancel.clone(),
        );
        enforcement = Some(monitor.enforcement());
        monitor.spawn()
    });

    let ctx = ActionContext {
        shell: session.shell.clone(),
        selection: settings.default_selection,
        settings: settings.clone(),
        layout: layout.clone(),
        cancel: cancel.clone(),
        explicit_targets: args.targets.clone(),
        suspend_packages: args.suspend_packages(),
        show_progress: !args.quiet,
    };

    match args.action {
        Some(arg) => match arg.action() {
            Some(id) => {
                let result = run_action(id, &ctx).await;
                ui::print_action_result(id, &result);
            }
            None => {
                for (id, result) in run_auto(&ctx).await {
                    ui::print_action_result(id, &result);
                }
            }
        },
        None => interactive(&ctx, &args, enforcement).await?,
    }

    if let Some(handle) = monitor {
        handle.abort();
    }

    if let Some(format) = args.compress {
        compress_output(&layout, format, &args.case_name, args.case_number.as_deref(), args.quiet)?;
    }

    log::info!("ITeratOr finished");
    Ok(())
}
