use crate::{
    dice_service::DiceService,
    error::{
        AutoBetError,
        RejectedBet,
        ResolveError,
    },
    resolver::RoundResolver,
    session::{
        Round,
        SharedSession,
    },
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{
        mpsc::{
            self,
            error::TryRecvError,
        },
        watch,
    },
    task::JoinHandle,
    time::{
        self,
        Instant,
        MissedTickBehavior,
    },
};
use tracing::{
    error,
    info,
    warn,
};

pub const DEFAULT_AUTO_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoBetPlan {
    pub bet_count: u32,
    pub bet_amount_per_round: i64,
    pub interval: Duration,
}

impl AutoBetPlan {
    pub fn new(bet_count: u32, bet_amount_per_round: i64) -> Self {
        Self {
            bet_count,
            bet_amount_per_round,
            interval: DEFAULT_AUTO_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), AutoBetError> {
        if self.bet_count == 0 {
            return Err(AutoBetError::InvalidPlan("bet count must be at least 1"));
        }
        if self.bet_amount_per_round <= 0 {
            return Err(AutoBetError::InvalidPlan("bet amount must be positive"));
        }
        if self.interval.is_zero() {
            return Err(AutoBetError::InvalidPlan("interval must be non-zero"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SchedulerState {
    #[default]
    Idle,
    Running {
        plan: AutoBetPlan,
        completed: u32,
    },
}

impl SchedulerState {
    pub fn is_running(&self) -> bool {
        matches!(self, SchedulerState::Running { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    BalanceExhausted,
    Rejected(RejectedBet),
    Cancelled,
    LedgerFault,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoBetReport {
    /// Slots consumed, including rounds whose roll failed.
    pub completed: u32,
    pub resolved: u32,
    pub failed: u32,
    pub reason: StopReason,
}

#[derive(Clone, Debug)]
pub enum AutoBetEvent {
    RoundResolved { round: Round, completed: u32 },
    RoundFailed { error: String, completed: u32 },
    Stopped(AutoBetReport),
}

enum AutoBetCommand {
    Stop,
}

struct ActiveRun {
    cmd_tx: mpsc::UnboundedSender<AutoBetCommand>,
    handle: JoinHandle<AutoBetReport>,
}

/// Drives a bounded run of rounds on a fixed cadence. At most one run exists
/// at a time.
pub struct AutoBetScheduler<S> {
    resolver: RoundResolver<S>,
    session: SharedSession,
    state_tx: Arc<watch::Sender<SchedulerState>>,
    state_rx: watch::Receiver<SchedulerState>,
    events: Option<mpsc::UnboundedSender<AutoBetEvent>>,
    run: Option<ActiveRun>,
}

impl<S: DiceService + 'static> AutoBetScheduler<S> {
    pub fn new(resolver: RoundResolver<S>, session: SharedSession) -> Self {
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        Self {
            resolver,
            session,
            state_tx: Arc::new(state_tx),
            state_rx,
            events: None,
            run: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<AutoBetEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state_rx.borrow().is_running()
    }

    pub fn start(&mut self, plan: AutoBetPlan) -> Result<(), AutoBetError> {
        plan.validate()?;
        if self.is_running() {
            return Err(AutoBetError::AlreadyRunning);
        }
        self.state_tx
            .send_replace(SchedulerState::Running { plan, completed: 0 });
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_plan(
            plan,
            self.resolver.clone(),
            self.session.clone(),
            self.state_tx.clone(),
            self.events.clone(),
            cmd_rx,
        ));
        info!(
            bet_count = plan.bet_count,
            bet_amount = plan.bet_amount_per_round,
            interval_ms = plan.interval.as_millis() as u64,
            "auto-bet started"
        );
        self.run = Some(ActiveRun { cmd_tx, handle });
        Ok(())
    }

    /// Manual bets share the session with the running plan and are refused
    /// until it stops.
    pub fn guard_manual_bet(&self) -> Result<(), AutoBetError> {
        if self.is_running() {
            return Err(AutoBetError::ManualBetDuringAutoBet);
        }
        Ok(())
    }

    /// Ask the running plan to halt at its next tick boundary.
    pub fn stop(&self) -> bool {
        match &self.run {
            Some(run) if self.is_running() => run.cmd_tx.send(AutoBetCommand::Stop).is_ok(),
            _ => false,
        }
    }

    /// Wait for the current run to finish and return its report.
    pub async fn join(&mut self) -> Option<AutoBetReport> {
        let run = self.run.take()?;
        match run.handle.await {
            Ok(report) => Some(report),
            Err(err) => {
                error!(%err, "auto-bet task panicked");
                self.state_tx.send_replace(SchedulerState::Idle);
                None
            }
        }
    }
}

impl<S> Drop for AutoBetScheduler<S> {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            let _ = run.cmd_tx.send(AutoBetCommand::Stop);
        }
    }
}

async fn run_plan<S: DiceService>(
    plan: AutoBetPlan,
    resolver: RoundResolver<S>,
    session: SharedSession,
    state_tx: Arc<watch::Sender<SchedulerState>>,
    events: Option<mpsc::UnboundedSender<AutoBetEvent>>,
    mut cmd_rx: mpsc::UnboundedReceiver<AutoBetCommand>,
) -> AutoBetReport {
    let emit = |event: AutoBetEvent| {
        if let Some(tx) = &events {
            let _ = tx.send(event);
        }
    };

    let mut ticker = time::interval_at(Instant::now() + plan.interval, plan.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut completed = 0u32;
    let mut resolved = 0u32;
    let mut failed = 0u32;

    let reason = loop {
        // A stop queued during a slow round must win over the tick that is
        // already due when the round returns.
        tokio::select! {
            biased;
            cmd = cmd_rx.recv() => match cmd {
                Some(AutoBetCommand::Stop) | None => break StopReason::Cancelled,
            },
            _ = ticker.tick() => {}
        }
        match cmd_rx.try_recv() {
            Ok(AutoBetCommand::Stop) | Err(TryRecvError::Disconnected) => {
                break StopReason::Cancelled;
            }
            Err(TryRecvError::Empty) => {}
        }

        let mut guard = session.lock().await;
        if guard.balance() == 0 {
            break StopReason::BalanceExhausted;
        }
        let threshold = guard.threshold();
        let result = resolver
            .resolve(&mut guard, plan.bet_amount_per_round, threshold)
            .await;
        drop(guard);

        match result {
            Ok(round) => {
                completed += 1;
                resolved += 1;
                emit(AutoBetEvent::RoundResolved { round, completed });
            }
            Err(ResolveError::Rejected(rejected)) => {
                info!(%rejected, completed, "auto-bet halted by rejected bet");
                break StopReason::Rejected(rejected);
            }
            Err(ResolveError::RollTransport(err)) => {
                completed += 1;
                failed += 1;
                warn!(%err, completed, "auto-bet round failed");
                emit(AutoBetEvent::RoundFailed {
                    error: err.to_string(),
                    completed,
                });
            }
            Err(ResolveError::Ledger(err)) => {
                error!(%err, "auto-bet halted by ledger fault");
                break StopReason::LedgerFault;
            }
        }
        if completed >= plan.bet_count {
            break StopReason::Completed;
        }
        state_tx.send_replace(SchedulerState::Running { plan, completed });
    };

    state_tx.send_replace(SchedulerState::Idle);
    let report = AutoBetReport {
        completed,
        resolved,
        failed,
        reason,
    };
    info!(?report, "auto-bet stopped");
    emit(AutoBetEvent::Stopped(report));
    report
}
