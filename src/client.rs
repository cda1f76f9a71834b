use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use roll_over_dice::{
    auto_bet::{
        AutoBetEvent,
        AutoBetPlan,
        AutoBetReport,
        AutoBetScheduler,
        SchedulerState,
        StopReason,
    },
    config::AppConfig,
    dice_service::DiceBackend,
    error::{
        AutoBetError,
        ResolveError,
        VerifyError,
    },
    ledger::{
        BalanceLedger,
        FileBalanceStore,
    },
    odds,
    resolver::RoundResolver,
    session::{
        Round,
        Session,
        SessionSnapshot,
        SharedSession,
    },
    verify::{
        Verification,
        VerificationClient,
    },
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{
    error,
    info,
    warn,
};

pub const DEFAULT_BET_AMOUNT: u64 = 10;
pub const DEFAULT_AUTO_BET_AMOUNT: u64 = 10;
pub const DEFAULT_AUTO_BET_COUNT: u32 = 1;
pub const MAX_AUTO_BET_COUNT: u32 = 10;
const HISTORY_MODAL_DEPTH: usize = 50;
const MAX_ERRORS: usize = 50;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PlayMode {
    #[default]
    Manual,
    Auto,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub session: SessionSnapshot,
    pub play_mode: PlayMode,
    pub bet_amount: u64,
    pub auto_bet_count: u32,
    pub auto_bet_amount: u64,
    pub scheduler: SchedulerState,
    pub backend: String,
    pub verification: Option<String>,
    pub status: String,
    pub errors: Vec<String>,
}

pub struct AppController {
    session: SharedSession,
    resolver: RoundResolver<DiceBackend>,
    verifier: VerificationClient<DiceBackend>,
    scheduler: AutoBetScheduler<DiceBackend>,
    backend: String,
    auto_interval: Duration,
    play_mode: PlayMode,
    bet_amount: u64,
    auto_bet_count: u32,
    auto_bet_amount: u64,
    verification: Option<String>,
    cached_session: SessionSnapshot,
    pub status: String,
    errors: Vec<String>,
}

impl AppController {
    pub fn new(config: &AppConfig) -> Result<(Self, mpsc::UnboundedReceiver<AutoBetEvent>)> {
        let data_dir = config.data_dir();
        let store = FileBalanceStore::new(&data_dir)
            .wrap_err_with(|| format!("opening balance store in {}", data_dir.display()))?;
        let ledger = BalanceLedger::open(
            config.game_id.clone(),
            Box::new(store),
            config.starting_balance,
        );
        let session = Session::new(ledger);
        let cached_session = session.snapshot(HISTORY_MODAL_DEPTH);
        let session = session.into_shared();

        let backend = config.backend().wrap_err("building dice service client")?;
        let backend_label = backend.describe();
        let service = Arc::new(backend);
        let resolver = RoundResolver::new(service.clone());
        let verifier = VerificationClient::new(service);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let scheduler =
            AutoBetScheduler::new(resolver.clone(), session.clone()).with_events(event_tx);

        info!(backend = %backend_label, balance = cached_session.balance, "session ready");
        let controller = Self {
            session,
            resolver,
            verifier,
            scheduler,
            backend: backend_label,
            auto_interval: config.auto_interval(),
            play_mode: PlayMode::Manual,
            bet_amount: DEFAULT_BET_AMOUNT,
            auto_bet_count: DEFAULT_AUTO_BET_COUNT,
            auto_bet_amount: DEFAULT_AUTO_BET_AMOUNT,
            verification: None,
            cached_session,
            status: String::from("Ready"),
            errors: Vec::new(),
        };
        Ok((controller, event_rx))
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Refresh from the live session when it is free. An auto round holding
    /// the lock leaves the previous copy in place.
    fn refresh_session(&mut self) {
        if let Ok(guard) = self.session.try_lock() {
            self.cached_session = guard.snapshot(HISTORY_MODAL_DEPTH);
        }
    }

    pub fn build_snapshot(&mut self) -> AppSnapshot {
        self.refresh_session();
        AppSnapshot {
            session: self.cached_session.clone(),
            play_mode: self.play_mode,
            bet_amount: self.bet_amount,
            auto_bet_count: self.auto_bet_count,
            auto_bet_amount: self.auto_bet_amount,
            scheduler: self.scheduler.state(),
            backend: self.backend.clone(),
            verification: self.verification.clone(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    pub fn toggle_mode(&mut self) {
        self.play_mode = match self.play_mode {
            PlayMode::Manual => PlayMode::Auto,
            PlayMode::Auto => PlayMode::Manual,
        };
    }

    pub fn set_bet_amount(&mut self, amount: u64) {
        self.bet_amount = amount;
    }

    pub fn halve_bet(&mut self) {
        self.bet_amount = odds::halve_bet(self.bet_amount);
    }

    pub fn double_bet(&mut self) {
        self.bet_amount = odds::double_bet(self.bet_amount, self.cached_session.balance);
    }

    pub fn set_auto_plan(&mut self, bet_count: u32, bet_amount: u64) {
        self.auto_bet_count = bet_count.clamp(1, MAX_AUTO_BET_COUNT);
        self.auto_bet_amount = bet_amount;
    }

    /// Move the threshold by one step. Refused while a round holds the session.
    pub fn nudge_threshold(&mut self, raise: bool) -> bool {
        let Ok(mut guard) = self.session.try_lock() else {
            return false;
        };
        let current = guard.threshold();
        let next = if raise { current.raise() } else { current.lower() };
        guard.set_threshold(next.get() as i64);
        self.cached_session = guard.snapshot(HISTORY_MODAL_DEPTH);
        true
    }

    pub async fn place_bet(&mut self) -> Result<Round> {
        self.scheduler.guard_manual_bet()?;
        let mut guard = self.session.lock().await;
        let threshold = guard.threshold();
        let result = self
            .resolver
            .resolve(&mut guard, self.bet_amount as i64, threshold)
            .await;
        self.cached_session = guard.snapshot(HISTORY_MODAL_DEPTH);
        drop(guard);
        let round = result?;
        self.verification = None;
        Ok(round)
    }

    /// Verify the round at `index` in history, or the latest one.
    pub async fn verify(&mut self, index: Option<usize>) -> Result<Verification, VerifyError> {
        let round = match index {
            Some(index) => self
                .cached_session
                .recent_rounds
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, round)| round.clone()),
            None => self.cached_session.last_round.clone(),
        }
        .ok_or(VerifyError::NoRound)?;
        let verdict = self.verifier.verify(&round).await?;
        self.verification = Some(verdict.message().to_string());
        Ok(verdict)
    }

    pub fn start_auto(&mut self) -> Result<(), AutoBetError> {
        let plan = AutoBetPlan::new(self.auto_bet_count, self.auto_bet_amount as i64)
            .with_interval(self.auto_interval);
        self.scheduler.start(plan)
    }

    pub fn stop_auto(&mut self) -> bool {
        self.scheduler.stop()
    }

    pub async fn finish_auto(&mut self) -> Option<AutoBetReport> {
        self.scheduler.join().await
    }

    pub async fn shutdown(&mut self) {
        if self.scheduler.stop() {
            info!("stopping auto-bet before exit");
        }
        self.scheduler.join().await;
    }
}

/// "Dice: N → You Won!" style line for a settled round.
pub fn result_line(round: &Round) -> String {
    let verdict = if round.is_win() {
        "You Won!"
    } else {
        "You Lost!"
    };
    format!("Dice: {} → {}", round.dice_value, verdict)
}

pub fn stop_message(report: &AutoBetReport) -> String {
    let reason = match report.reason {
        StopReason::Completed => String::from("finished"),
        StopReason::BalanceExhausted => String::from("balance exhausted"),
        StopReason::Rejected(rejected) => format!("stopped: {rejected}"),
        StopReason::Cancelled => String::from("stopped by player"),
        StopReason::LedgerFault => String::from("stopped: ledger fault"),
    };
    format!(
        "Auto-bet {} after {} rounds ({} won or lost, {} failed)",
        reason, report.completed, report.resolved, report.failed
    )
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let (controller, auto_events) = AppController::new(&config)?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    tracing::info!("UI ready");
    let res = run_loop(controller, &mut ui_state, &mut input_events, auto_events).await;
    ui::terminal_exit()?;
    res
}

fn sync_status(
    controller: &mut AppController,
    snapshot: &mut AppSnapshot,
    status: impl Into<String>,
) {
    controller.set_status(status);
    *snapshot = controller.build_snapshot();
}

fn sync_error(
    controller: &mut AppController,
    snapshot: &mut AppSnapshot,
    error_msg: impl Into<String>,
) {
    controller.push_errors(vec![error_msg.into()]);
    *snapshot = controller.build_snapshot();
}

fn show_processing_status(
    controller: &mut AppController,
    snapshot: &mut AppSnapshot,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    sync_status(controller, snapshot, message);
    ui::draw(ui_state, snapshot).wrap_err(context)
}

async fn run_loop(
    mut controller: AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
    mut auto_events: mpsc::UnboundedReceiver<AutoBetEvent>,
) -> Result<()> {
    tracing::info!("Running app loop");
    let mut snapshot = controller.build_snapshot();
    ui::draw(ui_state, &snapshot).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            maybe_event = auto_events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("auto-bet event channel closed");
                    break;
                };
                match event {
                    AutoBetEvent::RoundResolved { round, completed } => {
                        let message = format!(
                            "Auto {}/{} | {}",
                            completed,
                            controller.auto_bet_count,
                            result_line(&round)
                        );
                        controller.verification = None;
                        sync_status(&mut controller, &mut snapshot, message);
                    }
                    AutoBetEvent::RoundFailed { error, completed } => {
                        let msg = format!("Auto round {} failed: {}", completed, error);
                        sync_error(&mut controller, &mut snapshot, msg);
                    }
                    AutoBetEvent::Stopped(report) => {
                        controller.finish_auto().await;
                        sync_status(&mut controller, &mut snapshot, stop_message(&report));
                    }
                }
                ui::draw(ui_state, &snapshot).wrap_err("draw after auto-bet event failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw
                    | ui::UserEvent::OpenBetModal
                    | ui::UserEvent::OpenAutoModal
                    | ui::UserEvent::OpenHistory => {
                        snapshot = controller.build_snapshot();
                    }
                    ui::UserEvent::ToggleMode => {
                        controller.toggle_mode();
                        snapshot = controller.build_snapshot();
                    }
                    ui::UserEvent::SetBetAmount(amount) => {
                        controller.set_bet_amount(amount);
                        snapshot = controller.build_snapshot();
                    }
                    ui::UserEvent::HalveBet => {
                        controller.halve_bet();
                        snapshot = controller.build_snapshot();
                    }
                    ui::UserEvent::DoubleBet => {
                        controller.double_bet();
                        snapshot = controller.build_snapshot();
                    }
                    ui::UserEvent::ThresholdUp | ui::UserEvent::ThresholdDown => {
                        let raise = matches!(ev, ui::UserEvent::ThresholdUp);
                        if controller.nudge_threshold(raise) {
                            snapshot = controller.build_snapshot();
                        } else {
                            sync_status(
                                &mut controller,
                                &mut snapshot,
                                "Round in flight; threshold unchanged",
                            );
                        }
                    }
                    ui::UserEvent::PlaceBet => {
                        let status_msg = format!(
                            "Rolling {} over {}...",
                            controller.bet_amount,
                            snapshot.session.threshold
                        );
                        show_processing_status(
                            &mut controller,
                            &mut snapshot,
                            ui_state,
                            status_msg,
                            "draw while rolling failed",
                        )?;
                        match controller.place_bet().await {
                            Ok(round) => {
                                controller.clear_errors();
                                sync_status(&mut controller, &mut snapshot, result_line(&round));
                            }
                            Err(e) => {
                                let msg = match e.downcast_ref::<ResolveError>() {
                                    Some(ResolveError::Rejected(rejected)) => {
                                        format!("Bet rejected: {}", rejected)
                                    }
                                    _ => format!("Bet failed: {}", e),
                                };
                                sync_error(&mut controller, &mut snapshot, msg);
                            }
                        }
                    }
                    ui::UserEvent::VerifyLatest | ui::UserEvent::VerifyRound(_) => {
                        let index = match ev {
                            ui::UserEvent::VerifyRound(index) => Some(index),
                            _ => None,
                        };
                        show_processing_status(
                            &mut controller,
                            &mut snapshot,
                            ui_state,
                            "Checking fairness...",
                            "draw while verifying failed",
                        )?;
                        match controller.verify(index).await {
                            Ok(verdict) => {
                                sync_status(&mut controller, &mut snapshot, verdict.message());
                            }
                            Err(VerifyError::NoRound) => {
                                sync_status(&mut controller, &mut snapshot, "Nothing to verify yet");
                            }
                            Err(e) => {
                                controller.verification = None;
                                sync_error(&mut controller, &mut snapshot, e.to_string());
                            }
                        }
                    }
                    ui::UserEvent::SetAutoPlan { bet_count, bet_amount } => {
                        controller.set_auto_plan(bet_count, bet_amount);
                        snapshot = controller.build_snapshot();
                    }
                    ui::UserEvent::StartAuto => match controller.start_auto() {
                        Ok(()) => {
                            let message = format!(
                                "Auto-bet running: {} x {} every {} ms",
                                controller.auto_bet_count,
                                controller.auto_bet_amount,
                                controller.auto_interval.as_millis()
                            );
                            controller.clear_errors();
                            sync_status(&mut controller, &mut snapshot, message);
                        }
                        Err(e) => {
                            sync_error(&mut controller, &mut snapshot, format!("Auto-bet: {}", e));
                        }
                    },
                    ui::UserEvent::StopAuto => {
                        let message = if controller.stop_auto() {
                            "Stopping auto-bet..."
                        } else {
                            "Auto-bet is not running"
                        };
                        sync_status(&mut controller, &mut snapshot, message);
                    }
                }
                ui::draw(ui_state, &snapshot).wrap_err("draw after input failed")?;
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}
