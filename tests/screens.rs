// Two screens and the overlay controls sharing one application context.
use pipwatch::timer::{ManualTicks, ManualTimeSource, ScreenFrame};
use pipwatch::{AppContext, ControlAction, RunState, TimerConfig, TimerEngine};

fn manual_context() -> (AppContext, ManualTimeSource, ManualTicks) {
    let clock = ManualTimeSource::new(10_000);
    let ticks = ManualTicks::new();
    let engine = TimerEngine::builder()
        .time_source(clock.clone())
        .tick_scheduler(ticks.clone())
        .build()
        .expect("runtime available");
    (
        AppContext::with_engine(TimerConfig::default(), engine),
        clock,
        ticks,
    )
}

/// Lets aborted update loops be torn down.
async fn settle() {
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn screens_and_overlay_drive_the_same_stopwatch() {
    let (ctx, clock, ticks) = manual_context();
    let mut stopwatch = ctx.stopwatch_screen();
    let mut movie = ctx.movie_screen();
    let (overlay, dispatcher) = ctx.control_channel();
    let dispatcher = dispatcher.spawn();

    // Start from the main screen.
    assert_eq!(stopwatch.on_start_or_pause(), RunState::Running);
    ticks.parked().await;
    clock.advance(1_000);
    assert!(ticks.step().await);

    let running = ScreenFrame {
        display: "00:01:00".to_string(),
        started: true,
    };
    assert_eq!(stopwatch.render(), running);
    assert_eq!(movie.render(), running);

    // Pause from the overlay while the app is shrunk.
    overlay
        .send_code(ControlAction::StartOrPause.code())
        .expect("overlay channel open");
    let frame = movie.next_frame().await.expect("engine alive");
    assert!(!frame.started);
    assert_eq!(frame.display, "00:01:00");

    // Time passing while paused is not counted and the old loop is gone.
    settle().await;
    clock.advance(4_000);
    assert!(!ticks.tick());
    assert!(!ticks.is_parked());
    assert_eq!(ctx.engine().elapsed_millis(), 1_000);

    // Resume from the main screen, tick once more.
    stopwatch.on_start_or_pause();
    assert_eq!(ctx.engine().start_reference_millis(), 14_000);
    ticks.parked().await;
    clock.advance(1_000);
    assert!(ticks.step().await);
    assert_eq!(stopwatch.render().display, "00:02:00");

    // Clear from the overlay keeps it running.
    overlay
        .send(ControlAction::Clear)
        .expect("overlay channel open");
    drop(overlay);
    let stats = dispatcher.await.expect("dispatcher task");
    assert_eq!(stats.applied, 2);

    assert_eq!(
        movie.render(),
        ScreenFrame {
            display: "00:00:00".to_string(),
            started: true,
        }
    );
}
