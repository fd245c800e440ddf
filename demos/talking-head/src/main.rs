//! MIMIC Talking Head Demo
//!
//! Runs a full avatar session against a headless renderer:
//! - Loads a model from disk (or a built-in rigged head)
//! - Speaks typed text through the simulated speech backend
//! - Shows the mouth opening as a level meter
//!
//! Usage: `talking-head [config.json]`

mod ui;

use std::sync::Arc;

use mimic_asset::{Candidate, FsSource};
use mimic_runtime::{init_tracing, AvatarConfig, AvatarSession, HeadlessRenderer};
use mimic_test::ModelFixture;
use mimic_voice::SimulatedSpeechBackend;

use ui::DemoUI;

/// Write the built-in head to a scratch directory and serve it from there
fn builtin_model() -> std::io::Result<(FsSource, Vec<Candidate>)> {
    let dir = std::env::temp_dir().join("mimic-talking-head");
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("head.glb"), ModelFixture::nodding_head().to_glb())?;
    Ok((FsSource::with_root(dir), vec![Candidate::new("head.glb")]))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => AvatarConfig::from_json_file(&path)?,
        None => AvatarConfig::default(),
    };
    init_tracing(&config.logging);

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║           MIMIC Demo - Talking Head                        ║");
    println!("║     Procedural lip-sync on a headless renderer             ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let (source, candidates) = if config.models.is_empty() {
        println!("No models configured, using the built-in head.");
        builtin_model()?
    } else {
        (FsSource::new(), config.candidates()?)
    };

    let backend = Arc::new(SimulatedSpeechBackend::new(config.speech.to_simulated()));
    let renderer = HeadlessRenderer::new();
    let probe = renderer.probe();
    let session = AvatarSession::start(config.session_config()?, source, Box::new(renderer), backend)?;

    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║  Commands:                                                 ║");
    println!("║    <text>             - Say something                      ║");
    println!("║    /say <text>        - Say something                      ║");
    println!("║    /load <p1> [p2..]  - Load a model with fallbacks        ║");
    println!("║    /retry             - Retry the last load                ║");
    println!("║    /resize <w> <h>    - Resize the viewport                ║");
    println!("║    /status            - Show session status                ║");
    println!("║    /quit              - Exit                               ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let mut ui = DemoUI::new(session, probe);
    ui.load(&candidates).await;
    ui.run().await?;

    println!("Goodbye!");
    Ok(())
}
