//! Runner - drives a session from a one-second tokio interval

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep, interval_at, sleep};
use tracing::{debug, info, warn};

use super::{START_DELAY_MS, Session, TimerEvent, TimerSnapshot};
use crate::plans::WorkoutPlan;
use crate::settings::Feedback;
use crate::timer::RecordLog;

const TICK: Duration = Duration::from_secs(1);

/// User actions forwarded to the running session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Start(WorkoutPlan),
    TogglePause,
    Pause,
    Resume,
    Skip,
    Reset,
}

/// Cloneable handle to a spawned session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshots: watch::Receiver<TimerSnapshot>,
}

impl SessionHandle {
    /// Queue a command. Returns false if the session task is gone.
    pub fn send(&self, command: SessionCommand) -> bool {
        match self.commands.send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!("Session is not running, dropped {:?}", e.0);
                false
            }
        }
    }

    /// Latest published state
    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.clone()
    }
}

/// Spawn the session task. It stops once every handle is dropped and hands the session back.
pub fn spawn_session<F, L>(session: Session<F, L>) -> (SessionHandle, JoinHandle<Session<F, L>>)
where
    F: Feedback + Send + 'static,
    L: RecordLog + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
    let task = tokio::spawn(run_session(session, command_rx, snapshot_tx));
    let handle = SessionHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
    };
    (handle, task)
}

async fn run_session<F, L>(
    mut session: Session<F, L>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    snapshots: watch::Sender<TimerSnapshot>,
) -> Session<F, L>
where
    F: Feedback,
    L: RecordLog,
{
    info!("Workout session task started");

    // At most one tick source and one pending start at any time
    let mut ticker: Option<Interval> = None;
    let mut start_delay: Option<Pin<Box<Sleep>>> = None;

    loop {
        let events = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => handle_command(&mut session, command, &mut start_delay),
                None => break,
            },
            _ = next_tick(&mut ticker) => session.tick(),
            _ = wait_start(&mut start_delay) => {
                start_delay = None;
                session.begin()
            }
        };

        schedule(&events, &mut ticker, &mut start_delay);
        snapshots.send_replace(session.snapshot());
    }

    info!("Workout session task stopped");
    session
}

fn handle_command<F: Feedback, L: RecordLog>(
    session: &mut Session<F, L>,
    command: SessionCommand,
    start_delay: &mut Option<Pin<Box<Sleep>>>,
) -> Vec<TimerEvent> {
    debug!("Session command: {:?}", command);
    match command {
        SessionCommand::Start(plan) => session.start(plan),
        // Pausing before the first exercise starts cancels the pending start
        SessionCommand::Pause | SessionCommand::TogglePause if start_delay.is_some() => {
            *start_delay = None;
            Vec::new()
        }
        SessionCommand::TogglePause => session.toggle_pause(),
        SessionCommand::Pause => session.pause(),
        SessionCommand::Resume => session.resume(),
        SessionCommand::Skip => session.skip(),
        SessionCommand::Reset => session.reset(),
    }
}

/// Replace, arm or drop the tick sources according to what the timer did
fn schedule(
    events: &[TimerEvent],
    ticker: &mut Option<Interval>,
    start_delay: &mut Option<Pin<Box<Sleep>>>,
) {
    for event in events {
        match event {
            TimerEvent::Armed => {
                *ticker = None;
                *start_delay = Some(Box::pin(sleep(Duration::from_millis(START_DELAY_MS))));
            }
            TimerEvent::PhaseStarted { .. } | TimerEvent::Resumed { .. } => {
                *start_delay = None;
                *ticker = Some(new_ticker());
            }
            TimerEvent::Paused | TimerEvent::Completed(_) | TimerEvent::Reset => {
                *ticker = None;
                *start_delay = None;
            }
        }
    }
}

fn new_ticker() -> Interval {
    let mut interval = interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn wait_start(start_delay: &mut Option<Pin<Box<Sleep>>>) {
    match start_delay {
        Some(delay) => delay.as_mut().await,
        None => pending::<()>().await,
    }
}
