//! Poll Event Publisher Implementation
//!
//! 把轮询回调转成广播事件，多个订阅者（日志、命令行进度、测试）各自消费

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::error::GenerationError;
use crate::application::ports::PollObserver;
use crate::domain::job::{GenerationResult, JobHandle, JobStatus};

/// 轮询事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PollEvent {
    /// 一次状态查询完成
    Tick {
        handle: JobHandle,
        tick: u32,
        status: String,
    },
    /// 生成成功
    Succeeded {
        handle: JobHandle,
        result: GenerationResult,
    },
    /// 生成失败 / 超时
    Failed {
        handle: JobHandle,
        error: String,
        retryable: bool,
    },
}

impl PollEvent {
    pub fn handle(&self) -> &JobHandle {
        match self {
            PollEvent::Tick { handle, .. }
            | PollEvent::Succeeded { handle, .. }
            | PollEvent::Failed { handle, .. } => handle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollEvent::Tick { .. })
    }
}

/// 事件发布器
pub struct PollEventPublisher {
    /// handle -> 单个任务的事件通道
    handle_channels: DashMap<JobHandle, broadcast::Sender<PollEvent>>,
    /// 全部任务的事件
    global_channel: broadcast::Sender<PollEvent>,
}

impl PollEventPublisher {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(100);
        Self {
            handle_channels: DashMap::new(),
            global_channel: global_tx,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全部任务的事件
    pub fn subscribe_global(&self) -> broadcast::Receiver<PollEvent> {
        self.global_channel.subscribe()
    }

    /// 订阅单个任务的事件
    ///
    /// 顺带清理已经没有接收者的通道（被取消的会话不会发布终止事件）
    pub fn subscribe(&self, handle: JobHandle) -> broadcast::Receiver<PollEvent> {
        self.handle_channels
            .retain(|h, tx| *h == handle || tx.receiver_count() > 0);
        self.handle_channels
            .entry(handle)
            .or_insert_with(|| broadcast::channel(32).0)
            .subscribe()
    }

    /// 关闭单个任务的通道，接收端随后收到 `Closed`
    ///
    /// 会话结束后调用，无论是终止还是取消
    pub fn release(&self, handle: &JobHandle) -> bool {
        self.handle_channels.remove(handle).is_some()
    }

    /// 当前保留的单任务通道数
    pub fn channel_count(&self) -> usize {
        self.handle_channels.len()
    }

    pub fn publish(&self, event: PollEvent) {
        let handle = *event.handle();
        let terminal = event.is_terminal();

        if let Some(sender) = self.handle_channels.get(&handle) {
            if let Err(e) = sender.send(event.clone()) {
                tracing::debug!(handle = %handle, error = %e, "Failed to publish poll event (no receivers)");
            }
        }
        if let Err(e) = self.global_channel.send(event) {
            tracing::debug!(handle = %handle, error = %e, "Failed to publish global poll event (no receivers)");
        }

        // 终止事件之后该任务不会再有事件
        if terminal {
            self.handle_channels.remove(&handle);
        }
    }
}

impl Default for PollEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// 把 PollObserver 回调桥接到 PollEventPublisher
pub struct BroadcastPollObserver {
    publisher: Arc<PollEventPublisher>,
}

impl BroadcastPollObserver {
    pub fn new(publisher: Arc<PollEventPublisher>) -> Self {
        Self { publisher }
    }
}

impl PollObserver for BroadcastPollObserver {
    fn on_tick(&self, handle: &JobHandle, tick: u32, status: &JobStatus) {
        self.publisher.publish(PollEvent::Tick {
            handle: *handle,
            tick,
            status: status.as_str().to_string(),
        });
    }

    fn on_success(&self, handle: &JobHandle, result: &GenerationResult) {
        self.publisher.publish(PollEvent::Succeeded {
            handle: *handle,
            result: result.clone(),
        });
    }

    fn on_failure(&self, handle: &JobHandle, error: &GenerationError) {
        self.publisher.publish(PollEvent::Failed {
            handle: *handle,
            error: error.to_string(),
            retryable: error.is_retryable(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobKind;

    fn handle() -> JobHandle {
        JobHandle::new(JobKind::MenuPoster, 9, Some(2))
    }

    #[tokio::test]
    async fn test_observer_publishes_to_handle_and_global() {
        let publisher = PollEventPublisher::new().arc();
        let mut global = publisher.subscribe_global();
        let mut scoped = publisher.subscribe(handle());

        let observer = BroadcastPollObserver::new(publisher.clone());
        observer.on_tick(&handle(), 1, &JobStatus::Pending);
        observer.on_failure(&handle(), &GenerationError::Timeout { waited_ms: 3_000 });

        for rx in [&mut global, &mut scoped] {
            assert_eq!(
                rx.recv().await.unwrap(),
                PollEvent::Tick {
                    handle: handle(),
                    tick: 1,
                    status: "pending".to_string()
                }
            );
            match rx.recv().await.unwrap() {
                PollEvent::Failed { retryable, .. } => assert!(retryable),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_terminal_event_closes_handle_channel() {
        let publisher = PollEventPublisher::new().arc();
        let mut scoped = publisher.subscribe(handle());

        publisher.publish(PollEvent::Succeeded {
            handle: handle(),
            result: GenerationResult {
                asset_url: "https://x/y.png".to_string(),
                result_asset_id: None,
                asset_type: None,
            },
        });

        assert!(scoped.recv().await.unwrap().is_terminal());
        assert!(matches!(
            scoped.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_session_channels_do_not_accumulate() {
        use crate::infrastructure::adapters::{FakeGenerationBackend, StaticCredentialProvider};
        use crate::infrastructure::memory::InMemoryPollRegistry;
        use crate::infrastructure::worker::StatusPoller;
        use crate::domain::job::StatusRules;
        use crate::domain::poll::PollConfig;

        let publisher = PollEventPublisher::new().arc();
        let poller = StatusPoller::new(
            Arc::new(FakeGenerationBackend::new()),
            Arc::new(StaticCredentialProvider::new(Some("token"))),
            InMemoryPollRegistry::new().arc(),
            Arc::new(StatusRules::default()),
        );
        let observer = Arc::new(BroadcastPollObserver::new(publisher.clone()));

        let mut scoped = publisher.subscribe(handle());
        let sub = poller.start(handle(), PollConfig::from_millis(1_000, 30_000).unwrap(), observer);
        assert!(sub.cancel());

        // 取消不发布终止事件，由会话结束方释放通道
        assert_eq!(publisher.channel_count(), 1);
        assert!(publisher.release(&handle()));
        assert_eq!(publisher.channel_count(), 0);
        assert!(matches!(
            scoped.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert!(!publisher.release(&handle()));
    }

    #[test]
    fn test_abandoned_channels_are_pruned_on_subscribe() {
        let publisher = PollEventPublisher::new();
        for asset_id in 0..5 {
            drop(publisher.subscribe(JobHandle::new(JobKind::Review, asset_id, Some(1))));
        }
        assert_eq!(publisher.channel_count(), 1);

        let _kept = publisher.subscribe(handle());
        assert_eq!(publisher.channel_count(), 1);
        let _other = publisher.subscribe(JobHandle::new(JobKind::Event, 1, None));
        assert_eq!(publisher.channel_count(), 2);
    }

    #[test]
    fn test_event_serialization() {
        let event = PollEvent::Tick {
            handle: handle(),
            tick: 3,
            status: "pending".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "Tick");
        assert_eq!(json["data"]["tick"], 3);
        assert_eq!(json["data"]["handle"]["kind"], "menu_poster");
    }
}
