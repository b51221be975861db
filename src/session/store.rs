//! 进程级会话存储
//!
//! session_id -> Arc<Mutex<Session>>：外层 RwLock 只保护映射表本身，
//! 每个会话有自己的 Mutex，同一会话的两次并发续接互斥，不同会话互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use super::{Session, SessionId};

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// 新建会话并登记，返回 (id, 会话句柄)
    pub async fn create(&self) -> (SessionId, Arc<Mutex<Session>>) {
        let session = Session::new();
        let id = session.id.clone();
        let handle = Arc::new(Mutex::new(session));
        self.sessions
            .write()
            .await
            .insert(id.clone(), handle.clone());
        (id, handle)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// 清理超时未活动的会话；正被占用（锁不可得）的会话视为活跃，跳过
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut expired: Vec<SessionId> = Vec::new();
        for (id, handle) in sessions.iter() {
            if let Ok(session) = handle.try_lock() {
                if session.is_expired(self.timeout) {
                    expired.push(id.clone());
                }
            }
        }
        for id in &expired {
            sessions.remove(id);
            tracing::info!(session = %id, "session expired, evicted");
        }
        expired.len()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (id, _) = store.create().await;

        assert!(store.get(&id).await.is_some());
        assert!(store.get("session_unknown").await.is_none());
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (id, _) = store.create().await;
        store.remove(&id).await;
        assert!(store.get(&id).await.is_none());
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = SessionStore::new(Duration::from_millis(0));
        let _ = store.create().await;
        let _ = store.create().await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let evicted = store.cleanup_expired().await;
        assert_eq!(evicted, 2);
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_skips_locked_session() {
        let store = SessionStore::new(Duration::from_millis(0));
        let (id, handle) = store.create().await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        // 正在处理中的会话（锁被持有）不被清理
        let guard = handle.lock().await;
        assert_eq!(store.cleanup_expired().await, 0);
        drop(guard);

        assert!(store.get(&id).await.is_some());
    }
}
