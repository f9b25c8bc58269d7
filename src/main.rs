mod args;

use args::{Args, Mode};
use obsidian_knight_run::adb::AdbShell;
use obsidian_knight_run::config::{AutomationConfig, ConfigProvider};
use obsidian_knight_run::game_automation::match_image::AssetError;
use obsidian_knight_run::game_automation::{
    AssetStore, AutomationEvent, AutomationHandle, Frame, FrameClassifier, GameAutomation,
    create_automation_channels,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let Some(args) = Args::parse() else {
        return ExitCode::SUCCESS;
    };

    let level = if args.debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();

    let provider = match ConfigProvider::load(&args.config_dir) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match &args.mode {
        Mode::Screenshot => screenshot(&args, &provider.snapshot()).await,
        Mode::Classify(path) => classify(&args, &provider.snapshot(), path),
        Mode::Run => run(&args, provider).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_classifier(templates: &Path, config: &AutomationConfig) -> Result<FrameClassifier, AssetError> {
    let assets = AssetStore::load_from_directory(templates)?;
    println!("🖼️ Loaded {} reference images from {:?}", assets.count(), templates);
    Ok(FrameClassifier::new(
        assets,
        config.thresholds.clone(),
        config.unknown_card_dir.clone(),
    ))
}

async fn connect(args: &Args, config: &AutomationConfig) -> Result<AdbShell, Box<dyn std::error::Error>> {
    let shell = AdbShell::connect(&config.adb_path, args.device.as_deref(), &config.adb_address()).await?;
    println!("📱 Device: {}", shell.serial());
    Ok(shell)
}

async fn screenshot(args: &Args, config: &AutomationConfig) -> Result<(), Box<dyn std::error::Error>> {
    let shell = connect(args, config).await?;
    let frame = shell.capture_frame().await?;
    if let Some((w, h)) = shell.native_size() {
        println!("📐 Native size {}x{}", w, h);
    }
    frame.save("cli-screenshot.png")?;
    println!("✅ Screenshot saved to cli-screenshot.png");
    Ok(())
}

fn classify(args: &Args, config: &AutomationConfig, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let classifier = load_classifier(&args.templates_dir, config)?;
    let bytes = std::fs::read(path)?;
    let frame = Frame::from_encoded(&bytes)?;
    let state = classifier.classify(&frame);
    println!("🎮 {:?}: {}", path, state);
    Ok(())
}

async fn run(args: &Args, provider: ConfigProvider) -> Result<(), Box<dyn std::error::Error>> {
    let config = provider.snapshot();
    let classifier = load_classifier(&args.templates_dir, &config)?;
    let shell = connect(args, &config).await?;

    let (event_tx, mut event_rx) = create_automation_channels();
    let mut automation = GameAutomation::new(Arc::new(shell), Arc::new(classifier), Arc::new(provider))
        .with_events(event_tx);
    let handle = automation.handle();

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                AutomationEvent::StateChanged(name) => println!("🎮 {}", name),
                AutomationEvent::Log(message) => println!("📝 {}", message),
                AutomationEvent::Error(error) => eprintln!("❌ {}", error),
            }
        }
    });
    tokio::spawn(stop_on_ctrl_c(handle.clone()));
    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(handle.clone()));

    println!("🚀 Automation running, press Ctrl-C to stop");
    automation.run().await;
    // Dropping the automation closes the event channel
    drop(automation);
    let _ = printer.await;

    let stats = handle.stats();
    println!(
        "📊 Runs: {}, cards: {}, obstacles: {}",
        stats.runs, stats.cards, stats.obstacles
    );
    Ok(())
}

async fn stop_on_ctrl_c(handle: AutomationHandle) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            println!("🛑 Ctrl-C received, stopping...");
            handle.stop();
        }
        Err(e) => log::warn!("⚠️ Cannot listen for Ctrl-C: {}", e),
    }
}

#[cfg(unix)]
async fn reload_on_hangup(handle: AutomationHandle) {
    use tokio::signal::unix::{SignalKind, signal};
    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            log::warn!("⚠️ Cannot listen for SIGHUP: {}", e);
            return;
        }
    };
    while hangup.recv().await.is_some() {
        if let Err(e) = handle.reload_config() {
            log::error!("❌ Config reload failed, keeping previous values: {}", e);
        }
    }
}
