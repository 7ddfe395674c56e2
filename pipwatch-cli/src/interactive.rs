use std::io::Write;

use anyhow::Context;
use colored::Colorize;
use pipwatch_timer::{AppContext, ScreenFrame};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// One line of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartOrPause,
    Clear,
    /// Raw overlay control code, routed through the control dispatcher.
    Control(i32),
    Help,
    Quit,
    Unknown,
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::StartOrPause;
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "s" | "space" | "start" | "pause" | "toggle" => Command::StartOrPause,
        "c" | "clear" => Command::Clear,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => other
            .parse::<i32>()
            .map(Command::Control)
            .unwrap_or(Command::Unknown),
    }
}

const HELP: &str = "commands: <enter>/s toggle, c clear, 1/2 overlay control code, q quit";

/// Output style for rendered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

pub fn render_text(frame: &ScreenFrame) -> String {
    let state = if frame.started {
        "running".green()
    } else {
        "paused".yellow()
    };
    format!("{}  [{}]", frame.display.bold(), state)
}

fn emit(ctx: &AppContext, frame: &ScreenFrame, output: Output) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    match output {
        Output::Text => {
            write!(stdout, "\r{}   ", render_text(frame))?;
        }
        Output::Json => {
            let line = serde_json::to_string(&ctx.engine().snapshot())
                .context("failed to encode snapshot")?;
            writeln!(stdout, "{}", line)?;
        }
    }
    stdout.flush()?;
    Ok(())
}

/// Runs the interactive stopwatch until stdin closes or the user quits.
pub async fn run(ctx: AppContext, output: Output) -> anyhow::Result<()> {
    let mut screen = ctx.stopwatch_screen();
    let (sender, dispatcher) = ctx.control_channel();
    let dispatcher = dispatcher.spawn();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("{}", HELP.dimmed());
    emit(&ctx, &screen.render(), output)?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Command::StartOrPause => {
                        let state = screen.on_start_or_pause();
                        debug!(?state, "toggled from keyboard");
                    }
                    Command::Clear => screen.on_clear(),
                    Command::Control(code) => sender
                        .send_code(code)
                        .context("control dispatcher stopped")?,
                    Command::Help => eprintln!("{}", HELP),
                    Command::Quit => break,
                    Command::Unknown => eprintln!("{} {}", "unknown command:".red(), line.trim()),
                }
                emit(&ctx, &screen.render(), output)?;
            }
            frame = screen.next_frame() => match frame {
                Some(frame) => emit(&ctx, &frame, output)?,
                None => break,
            },
        }
    }

    drop(sender);
    let stats = dispatcher.await.context("control dispatcher panicked")?;
    if output == Output::Text {
        println!();
    }
    info!(
        applied = stats.applied,
        ignored = stats.ignored,
        final_time = %ctx.engine().elapsed_display(),
        "stopwatch session ended"
    );
    Ok(())
}
