//! 에러 타입: 도메인별 에러 정의

/// Perceptor 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum PerceptorError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 스케줄러 에러
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// 클러스터 연동 에러
    #[error("cluster error: {0}")]
    Cluster(String),

    /// 스캔 백엔드 에러
    #[error("scanner error: {0}")]
    Scanner(String),

    /// 오케스트레이션 엔진 에러
    #[error("engine error: {0}")]
    Engine(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 스케줄러 상태 전환 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// 0 이하의 주기
    #[error("invalid delay for scheduler {name}: must be positive")]
    InvalidDelay { name: String },

    /// 현재 상태에서 일시정지 불가
    #[error("cannot pause scheduler {name} while in state {state}")]
    CannotPause { name: String, state: String },

    /// 액션 종료 후 일시정지가 이미 예약됨
    #[error("cannot pause scheduler {name}: pause already queued up")]
    PauseAlreadyQueued { name: String },

    /// 현재 상태에서 재개 불가
    #[error("cannot resume scheduler {name} while in state {state}")]
    CannotResume { name: String, state: String },

    /// 스케줄러가 이미 종료됨
    #[error("scheduler {name} is stopped")]
    Stopped { name: String },
}

/// 우선순위 큐 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// 이미 존재하는 키
    #[error("cannot add key {0}: key already in queue")]
    DuplicateKey(String),

    /// 존재하지 않는 키
    #[error("key {0} not found in queue")]
    KeyNotFound(String),

    /// 빈 큐에서 pop
    #[error("cannot pop: priority queue empty")]
    Empty,
}
