//! 주기 실행기: 일시정지/재개/취소가 가능한 ticker
//!
//! [`Scheduler`]는 `delay` 간격으로 비동기 액션을 실행합니다.
//! 액션이 `delay`보다 오래 걸리면 그 사이의 tick은 버려집니다(backpressure).
//!
//! # 상태 전환
//! ```text
//!            resume(false)              tick
//!   Paused ──────────────> Ready ───────────────> RunningAction
//!     ^   \  resume(true)    ^  <── action 종료 ──┘     │
//!     │    └──────────────────────────────────> ────────┘
//!     └──── pause() (Ready 즉시 / RunningAction 은 종료 후)
//!
//!   cancel ──> 실행 중인 액션 완료 대기 ──> Stopped
//! ```
//!
//! 생성 직후에는 `Paused` 상태입니다.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::SchedulerError;
use crate::pipeline::BoxFuture;

/// 스케줄러 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Ready,
    RunningAction,
    Paused,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::RunningAction => write!(f, "running-action"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

type Action = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

enum Command {
    Pause(oneshot::Sender<Result<(), SchedulerError>>),
    Resume {
        run_immediately: bool,
        reply: oneshot::Sender<Result<(), SchedulerError>>,
    },
    SetDelay(Duration),
    State(oneshot::Sender<SchedulerState>),
}

/// 주기 실행기 핸들
///
/// 핸들을 drop하면 내부 태스크도 취소와 동일하게 종료됩니다.
///
/// # 사용 예시
/// ```ignore
/// let cancel = CancellationToken::new();
/// let scheduler = Scheduler::new_running(
///     "poll",
///     Duration::from_secs(10),
///     cancel.clone(),
///     false,
///     move || async move { poll_once().await },
/// )
/// .await?;
/// scheduler.set_delay(Duration::from_secs(5)).await?;
/// cancel.cancel();
/// ```
pub struct Scheduler {
    name: String,
    commands: mpsc::Sender<Command>,
    task: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// 일시정지 상태의 스케줄러를 생성합니다.
    ///
    /// `delay`가 0이면 [`SchedulerError::InvalidDelay`]를 반환합니다.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        delay: Duration,
        cancel: CancellationToken,
        action: F,
    ) -> Result<Self, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        if delay.is_zero() {
            return Err(SchedulerError::InvalidDelay { name });
        }

        let action: Action = Arc::new(move || Box::pin(action()));
        let (commands, rx) = mpsc::channel(8);
        let worker = Worker {
            name: name.clone(),
            delay,
            action,
            state: SchedulerState::Paused,
            pause_after_action: false,
            ticker: None,
            running: None,
        };
        let task = tokio::spawn(worker.run(rx, cancel));

        Ok(Self {
            name,
            commands,
            task: Some(task),
        })
    }

    /// 스케줄러를 생성하고 즉시 재개합니다.
    pub async fn new_running<F, Fut>(
        name: impl Into<String>,
        delay: Duration,
        cancel: CancellationToken,
        run_immediately: bool,
        action: F,
    ) -> Result<Self, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let scheduler = Self::new(name, delay, cancel, action)?;
        scheduler.resume(run_immediately).await?;
        debug!(scheduler = %scheduler.name, "scheduler started");
        Ok(scheduler)
    }

    /// 스케줄러 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 일시정지합니다.
    ///
    /// `Ready`에서는 즉시, `RunningAction`에서는 액션 종료 후 적용됩니다.
    pub async fn pause(&self) -> Result<(), SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Pause(reply)).await?;
        rx.await.map_err(|_| self.stopped())?
    }

    /// `Paused` 상태에서만 재개할 수 있습니다.
    pub async fn resume(&self, run_immediately: bool) -> Result<(), SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Resume {
            run_immediately,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.stopped())?
    }

    /// 실행 주기를 변경합니다. 실행 중인 ticker에는 즉시 반영됩니다.
    pub async fn set_delay(&self, delay: Duration) -> Result<(), SchedulerError> {
        if delay.is_zero() {
            return Err(SchedulerError::InvalidDelay {
                name: self.name.clone(),
            });
        }
        self.send(Command::SetDelay(delay)).await
    }

    /// 현재 상태를 반환합니다. 종료된 스케줄러는 `Stopped`입니다.
    pub async fn state(&self) -> SchedulerState {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::State(reply)).await.is_err() {
            return SchedulerState::Stopped;
        }
        rx.await.unwrap_or(SchedulerState::Stopped)
    }

    /// 내부 태스크가 끝날 때까지 기다립니다 (취소 이후 사용).
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(scheduler = %self.name, error = %e, "scheduler task failed");
            }
        }
    }

    async fn send(&self, command: Command) -> Result<(), SchedulerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| self.stopped())
    }

    fn stopped(&self) -> SchedulerError {
        SchedulerError::Stopped {
            name: self.name.clone(),
        }
    }
}

struct Worker {
    name: String,
    delay: Duration,
    action: Action,
    state: SchedulerState,
    pause_after_action: bool,
    ticker: Option<Interval>,
    running: Option<JoinHandle<()>>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                finished = wait_action(&mut self.running) => {
                    self.running = None;
                    if let Err(e) = finished {
                        error!(scheduler = %self.name, error = %e, "scheduler action failed");
                    }
                    self.on_action_finished();
                }
                _ = wait_tick(&mut self.ticker) => self.on_tick(),
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        if let Some(running) = self.running.take() {
            debug!(scheduler = %self.name, "waiting for running action before stopping");
            if let Err(e) = running.await {
                error!(scheduler = %self.name, error = %e, "scheduler action failed");
            }
        }
        self.ticker = None;
        self.state = SchedulerState::Stopped;
        debug!(scheduler = %self.name, "scheduler stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Pause(reply) => {
                let _ = reply.send(self.pause());
            }
            Command::Resume {
                run_immediately,
                reply,
            } => {
                let _ = reply.send(self.resume(run_immediately));
            }
            Command::SetDelay(delay) => {
                debug!(scheduler = %self.name, delay_ms = delay.as_millis() as u64, "delay changed");
                self.delay = delay;
                if self.ticker.is_some() {
                    self.ticker = Some(new_ticker(delay));
                }
            }
            Command::State(reply) => {
                let _ = reply.send(self.state);
            }
        }
    }

    fn pause(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Ready => {
                self.state = SchedulerState::Paused;
                self.ticker = None;
                Ok(())
            }
            SchedulerState::RunningAction if self.pause_after_action => {
                Err(SchedulerError::PauseAlreadyQueued {
                    name: self.name.clone(),
                })
            }
            SchedulerState::RunningAction => {
                self.pause_after_action = true;
                Ok(())
            }
            state => Err(SchedulerError::CannotPause {
                name: self.name.clone(),
                state: state.to_string(),
            }),
        }
    }

    fn resume(&mut self, run_immediately: bool) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Paused {
            return Err(SchedulerError::CannotResume {
                name: self.name.clone(),
                state: self.state.to_string(),
            });
        }
        self.ticker = Some(new_ticker(self.delay));
        if run_immediately {
            self.execute();
        } else {
            self.state = SchedulerState::Ready;
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        match self.state {
            SchedulerState::Ready => self.execute(),
            SchedulerState::RunningAction => {
                warn!(
                    scheduler = %self.name,
                    "backpressuring: action already in progress, dropping tick"
                );
            }
            state => {
                debug!(scheduler = %self.name, state = %state, "ignoring tick");
            }
        }
    }

    fn on_action_finished(&mut self) {
        if self.pause_after_action {
            self.pause_after_action = false;
            self.state = SchedulerState::Paused;
            self.ticker = None;
        } else {
            self.state = SchedulerState::Ready;
        }
    }

    fn execute(&mut self) {
        self.state = SchedulerState::RunningAction;
        self.pause_after_action = false;
        self.running = Some(tokio::spawn((self.action)()));
    }
}

fn new_ticker(delay: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + delay, delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn wait_action(running: &mut Option<JoinHandle<()>>) -> Result<(), JoinError> {
    match running {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn wait_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn counting_action(
        counter: &Arc<AtomicUsize>,
        work: Duration,
    ) -> impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if !work.is_zero() {
                    tokio::time::sleep(work).await;
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_run_immediately() {
        // Given: 250ms 주기, 즉시 실행 없음
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let _scheduler = Scheduler::new_running(
            "no-immediate",
            Duration::from_millis(250),
            cancel.clone(),
            false,
            counting_action(&counter, Duration::ZERO),
        )
        .await
        .unwrap();

        // When: 650ms 경과
        tokio::time::sleep(Duration::from_millis(650)).await;

        // Then: 250ms, 500ms 두 번 실행
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_when_requested() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let _scheduler = Scheduler::new_running(
            "immediate",
            Duration::from_millis(250),
            cancel.clone(),
            true,
            counting_action(&counter, Duration::ZERO),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(650)).await;

        // 0ms, 250ms, 500ms
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn new_scheduler_is_paused_and_idle() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(
            "idle",
            Duration::from_millis(100),
            cancel.clone(),
            counting_action(&counter, Duration::ZERO),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(scheduler.state().await, SchedulerState::Paused);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_action_drops_ticks() {
        // Given: 액션이 600ms 걸리고 주기는 250ms
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let _scheduler = Scheduler::new_running(
            "slow",
            Duration::from_millis(250),
            cancel.clone(),
            true,
            counting_action(&counter, Duration::from_millis(600)),
        )
        .await
        .unwrap();

        // When: 1100ms 경과
        tokio::time::sleep(Duration::from_millis(1100)).await;

        // Then: 0ms, 750ms 에만 실행 (250/500/1000 tick은 버려짐)
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new_running(
            "pausable",
            Duration::from_millis(100),
            cancel.clone(),
            false,
            counting_action(&counter, Duration::ZERO),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        scheduler.pause().await.unwrap();
        assert_eq!(scheduler.state().await, SchedulerState::Paused);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        scheduler.resume(false).await.unwrap();
        assert_eq!(scheduler.state().await, SchedulerState::Ready);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn pause_while_running_is_queued_once() {
        // Given: 300ms 걸리는 액션이 즉시 실행 중
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new_running(
            "queued-pause",
            Duration::from_millis(100),
            cancel.clone(),
            true,
            counting_action(&counter, Duration::from_millis(300)),
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // When: 실행 중 두 번 pause
        scheduler.pause().await.unwrap();
        let second = scheduler.pause().await;

        // Then: 두 번째는 거부, 액션 종료 후 Paused
        assert!(matches!(
            second,
            Err(SchedulerError::PauseAlreadyQueued { .. })
        ));
        assert_eq!(scheduler.state().await, SchedulerState::RunningAction);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(scheduler.state().await, SchedulerState::Paused);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_transitions_are_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(
            "strict",
            Duration::from_millis(100),
            cancel.clone(),
            counting_action(&counter, Duration::ZERO),
        )
        .unwrap();

        assert!(matches!(
            scheduler.pause().await,
            Err(SchedulerError::CannotPause { .. })
        ));
        scheduler.resume(false).await.unwrap();
        assert!(matches!(
            scheduler.resume(false).await,
            Err(SchedulerError::CannotResume { .. })
        ));
        assert!(matches!(
            scheduler.set_delay(Duration::ZERO).await,
            Err(SchedulerError::InvalidDelay { .. })
        ));
        cancel.cancel();
    }

    #[test]
    fn zero_delay_is_rejected() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let result = Scheduler::new("zero", Duration::ZERO, CancellationToken::new(), || async {});
            assert!(matches!(result, Err(SchedulerError::InvalidDelay { .. })));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn set_delay_changes_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new_running(
            "retimed",
            Duration::from_millis(1000),
            cancel.clone(),
            false,
            counting_action(&counter, Duration::ZERO),
        )
        .await
        .unwrap();

        scheduler.set_delay(Duration::from_millis(100)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_waits_for_running_action() {
        // Given: 200ms 걸리는 액션이 실행 중
        let finished = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let flag = Arc::clone(&finished);
        let mut scheduler = Scheduler::new_running(
            "graceful",
            Duration::from_millis(1000),
            cancel.clone(),
            true,
            move || {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    flag.store(true, Ordering::SeqCst);
                }
            },
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // When: 취소
        cancel.cancel();
        scheduler.join().await;

        // Then: 액션은 끝까지 실행되고, 이후 호출은 Stopped
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(scheduler.state().await, SchedulerState::Stopped);
        assert!(matches!(
            scheduler.resume(true).await,
            Err(SchedulerError::Stopped { .. })
        ));
    }
}
