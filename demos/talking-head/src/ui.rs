//! Demo UI - Terminal front end for one avatar session

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use mimic_asset::{Candidate, FsSource, LoadProgress, ProgressSink};
use mimic_core::MimicError;
use mimic_runtime::{AvatarSession, RenderProbe};

/// Width of the mouth meter in characters
const METER_WIDTH: usize = 30;

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn meter(openness: f32) -> String {
    let filled = (openness.clamp(0.0, 1.0) * METER_WIDTH as f32).round() as usize;
    format!("{}{}", "█".repeat(filled), "·".repeat(METER_WIDTH - filled))
}

/// Demo UI handler
pub struct DemoUI {
    session: AvatarSession<FsSource>,
    probe: RenderProbe,
}

impl DemoUI {
    pub fn new(session: AvatarSession<FsSource>, probe: RenderProbe) -> Self {
        Self { session, probe }
    }

    /// Load `candidates`, printing progress and the outcome
    pub async fn load(&mut self, candidates: &[Candidate]) {
        let sink: ProgressSink = Arc::new(|p: LoadProgress| {
            if p.percent == 100 {
                println!("  candidate {} (pass {}): done", p.candidate_index, p.attempt);
            }
        });
        match self.session.load_model_with_progress(candidates, Some(sink)).await {
            Ok(id) => {
                let status = self.session.status();
                println!(
                    "✅ Loaded {} as {} ({} lip-sync targets, {} blink targets)",
                    status.model_path.unwrap_or_default(),
                    id,
                    status.targets,
                    status.blink_targets
                );
                if status.targets == 0 {
                    println!("⚠️  Nothing to animate on this model; it will render but stay still");
                }
            }
            Err(e @ MimicError::AssetLoadFatal { .. }) => {
                println!("❌ {e}");
                println!("   The stage keeps rendering. Use /retry or /load another model.");
            }
            Err(e) => println!("❌ Load failed: {e}"),
        }
    }

    fn print_status(&self) {
        let status = self.session.status();
        let log = self.probe.snapshot();
        println!("  Driver:      {:?}", status.driver);
        println!(
            "  Model:       {}",
            status.model_path.as_deref().unwrap_or("(none)")
        );
        println!(
            "  Targets:     {} lip-sync, {} blink",
            status.targets, status.blink_targets
        );
        println!(
            "  Speaking:    {} [{}]",
            status.speaking,
            meter(status.mouth_openness)
        );
        println!("  Blinking:    {}", status.blinking);
        println!(
            "  Viewport:    {}x{}",
            status.viewport.width, status.viewport.height
        );
        println!(
            "  Frames:      {} drawn, {} skipped",
            status.stats.executed_frames, status.stats.skipped_frames
        );
        println!(
            "  Writes:      {} bone, {} morph, {} clip, {} sway",
            status.stats.bone_writes,
            status.stats.morph_writes,
            status.stats.clip_writes,
            status.stats.sway_writes
        );
        if let Some(jaw) = log.last_jaw {
            println!("  Jaw angle:   {:.3} rad", jaw);
        }
    }

    fn say(&self, text: &str) {
        if text.is_empty() {
            println!("Usage: /say <text>");
        } else if !self.session.speak(text) {
            println!("⚠️  Speech is unavailable; the avatar stays quiet");
        }
    }

    /// Run the main UI loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Spawn mouth meter task
        let facade = self.session.facade();
        let meter_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(100));
            let mut was_speaking = false;
            loop {
                interval.tick().await;
                let speaking = facade.is_speaking();
                if speaking {
                    print!("\r🗣  [{}] ", meter(facade.mouth_openness()));
                    let _ = io::stdout().flush();
                } else if was_speaking {
                    println!("\r🤐 [{}] ", meter(0.0));
                    prompt();
                }
                was_speaking = speaking;
            }
        });

        // Main input loop
        let stdin = tokio::io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        prompt();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                prompt();
                continue;
            }

            if !line.starts_with('/') {
                self.say(line);
                continue;
            }

            let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
            let arg = arg.trim();
            match cmd {
                "/quit" | "/exit" | "/q" => break,
                "/say" | "/s" => self.say(arg),
                "/load" | "/l" => {
                    let candidates: Vec<Candidate> =
                        arg.split_whitespace().map(Candidate::new).collect();
                    if candidates.is_empty() {
                        println!("Usage: /load <path> [fallback ...]");
                    } else {
                        self.load(&candidates).await;
                    }
                }
                "/retry" => match self.session.retry_load().await {
                    Ok(id) => println!("✅ Loaded {id}"),
                    Err(e) => println!("❌ {e}"),
                },
                "/resize" => {
                    let dims: Vec<u32> = arg
                        .split_whitespace()
                        .filter_map(|s| s.parse().ok())
                        .collect();
                    match dims.as_slice() {
                        [w, h] => {
                            self.session.resize(*w, *h);
                            println!("Viewport is now {w}x{h}");
                        }
                        _ => println!("Usage: /resize <width> <height>"),
                    }
                }
                "/status" => self.print_status(),
                other => println!("Unknown command: {other}"),
            }
            prompt();
        }

        meter_handle.abort();
        self.session.teardown();
        tracing::info!("demo session closed");
        Ok(())
    }
}
