//! 单次解析结果
//!
//! 播放器选择只会产生一次结果。[`Resolver`] 负责写入，[`Resolution`]
//! 负责读取，状态为 Pending / Resolved / Cancelled 三者之一。
//! 写入端被丢弃或显式取消时，读取端会看到 Cancelled，
//! 而不是永远等待。

use tokio::sync::oneshot;

/// 解析状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionState<T> {
    Pending,
    Resolved(T),
    Cancelled,
}

impl<T> ResolutionState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, ResolutionState::Pending)
    }

    /// 取出解析值
    pub fn into_value(self) -> Option<T> {
        match self {
            ResolutionState::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

/// 写入端
#[derive(Debug)]
pub struct Resolver<T> {
    tx: Option<oneshot::Sender<T>>,
}

impl<T> Resolver<T> {
    /// 写入结果，只有第一次调用生效
    pub fn resolve(&mut self, value: T) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// 取消，读取端将看到 Cancelled
    pub fn cancel(&mut self) {
        self.tx.take();
    }

    /// 是否已经写入或取消
    pub fn is_settled(&self) -> bool {
        self.tx.is_none()
    }
}

/// 读取端
#[derive(Debug)]
pub struct Resolution<T> {
    rx: Option<oneshot::Receiver<T>>,
    state: ResolutionState<T>,
}

impl<T> Resolution<T> {
    /// 当前状态 (不等待)
    pub fn state(&mut self) -> &ResolutionState<T> {
        if let Some(rx) = self.rx.as_mut() {
            match rx.try_recv() {
                Ok(value) => {
                    self.state = ResolutionState::Resolved(value);
                    self.rx = None;
                }
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.state = ResolutionState::Cancelled;
                    self.rx = None;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }
        &self.state
    }

    /// 等待直到解析或取消
    pub async fn wait(mut self) -> ResolutionState<T> {
        match self.rx.take() {
            Some(rx) => match rx.await {
                Ok(value) => ResolutionState::Resolved(value),
                Err(_) => ResolutionState::Cancelled,
            },
            None => self.state,
        }
    }
}

/// 创建一对写入端和读取端
pub fn channel<T>() -> (Resolver<T>, Resolution<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Resolver { tx: Some(tx) },
        Resolution {
            rx: Some(rx),
            state: ResolutionState::Pending,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_once() {
        let (mut resolver, mut resolution) = channel();
        assert!(resolution.state().is_pending());

        assert!(resolver.resolve(1));
        assert!(!resolver.resolve(2));
        assert!(resolver.is_settled());

        assert_eq!(resolution.state(), &ResolutionState::Resolved(1));
        assert_eq!(resolution.wait().await, ResolutionState::Resolved(1));
    }

    #[tokio::test]
    async fn test_cancel() {
        let (mut resolver, resolution) = channel::<u8>();
        resolver.cancel();
        assert!(!resolver.resolve(1));
        assert_eq!(resolution.wait().await, ResolutionState::Cancelled);
    }

    #[tokio::test]
    async fn test_dropped_resolver_cancels() {
        let (resolver, mut resolution) = channel::<u8>();
        drop(resolver);
        assert_eq!(resolution.state(), &ResolutionState::Cancelled);
        assert_eq!(resolution.wait().await.into_value(), None);
    }

    #[tokio::test]
    async fn test_wait_across_tasks() {
        let (mut resolver, resolution) = channel();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            resolver.resolve("desktop");
        });
        assert_eq!(resolution.wait().await.into_value(), Some("desktop"));
    }
}
