use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::time::{Instant, timeout};

/// 共享存储访问错误
#[derive(Debug, Clone)]
pub enum StoreError {
    /// 存储服务不可达或调用超时
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// 共享键值存储抽象
///
/// 缓存和限流通过这组原子操作访问同一个存储实例，键前缀区分命名空间。
/// 进程内不保留任何存储状态副本，多副本部署时以存储中的数据为准。
#[async_trait]
pub trait Store: Send + Sync {
    /// 读取键值，键不存在或已过期时返回 None
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// 无条件覆盖写入并刷新过期时间
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), StoreError>;

    /// 原子自增，键不存在或已过期时初始化为 1 并附加 TTL。
    /// TTL 只在创建时设置一次，后续自增不刷新，窗口不会被持续请求顺延。
    /// 并发创建同一个键时只有一次自增会观察到 1，其余在其基础上累加。
    async fn increment_with_ttl_if_absent(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<u64, StoreError>;
}

// INCR 与 EXPIRE 在服务端作为单条原子命令执行，
// 避免客户端先读后写在并发或跨进程场景下丢失更新
const INCR_WITH_TTL_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
";

/// Redis 存储后端
pub struct RedisStore {
    client: Arc<redis::Client>,
    call_timeout: Duration,
    incr_script: redis::Script,
}

impl RedisStore {
    pub fn new(client: Arc<redis::Client>, call_timeout: Duration) -> Self {
        Self {
            client,
            call_timeout,
            incr_script: redis::Script::new(INCR_WITH_TTL_SCRIPT),
        }
    }

    /// 探测存储连通性，用于启动检查
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = timeout(self.call_timeout, redis::cmd("PING").query_async(&mut conn))
            .await
            .map_err(|_| StoreError::Unavailable("ping timed out".to_string()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        timeout(
            self.call_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StoreError::Unavailable("connection timed out".to_string()))?
        .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        let result: Option<String> = timeout(self.call_timeout, conn.get(key))
            .await
            .map_err(|_| StoreError::Unavailable("get timed out".to_string()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(result)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = timeout(self.call_timeout, conn.set_ex(key, value, ttl.as_secs()))
            .await
            .map_err(|_| StoreError::Unavailable("set timed out".to_string()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn increment_with_ttl_if_absent(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let count: u64 = timeout(
            self.call_timeout,
            self.incr_script
                .key(key)
                .arg(ttl.as_secs())
                .invoke_async(&mut conn),
        )
        .await
        .map_err(|_| StoreError::Unavailable("increment timed out".to_string()))?
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(count)
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// 进程内存储后端，用于测试和单实例运行
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn increment_with_ttl_if_absent(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<u64, StoreError> {
        // 读改写在同一把写锁内完成
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                let count = entry.value.parse::<u64>().unwrap_or(0) + 1;
                entry.value = count.to_string();
                Ok(count)
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: "1".to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(1)
            }
        }
    }
}

/// 模拟存储故障的后端，所有操作都返回不可用错误
#[cfg(test)]
pub struct UnavailableStore;

#[cfg(test)]
#[async_trait]
impl Store for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn set_with_ttl(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn increment_with_ttl_if_absent(
        &self,
        _key: &str,
        _ttl: Duration,
    ) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}
