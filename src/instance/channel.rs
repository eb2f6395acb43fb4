//! 实例间通道
//!
//! Unix 上是运行目录下的 Unix domain socket，Windows 上是命名管道。
//! 主实例串行处理连接：接受一个、读完、再接受下一个。每个连接最多读 256 字节、等待 2 秒，
//! 只认固定命令，其余内容丢弃。

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::InstanceEvent;

/// 唯一被接受的命令：把设置界面带到前台
pub const SHOW_SETTINGS_COMMAND: &str = "SHOW_SETTINGS";

const MAX_COMMAND_BYTES: u64 = 256;
const READ_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// 通道地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoint {
    #[cfg(unix)]
    path: std::path::PathBuf,
    #[cfg(windows)]
    name: String,
}

impl Endpoint {
    #[cfg(unix)]
    pub(crate) fn new(runtime_dir: &Path, key: &str) -> Self {
        Self {
            path: runtime_dir.join(format!("{}.sock", key)),
        }
    }

    #[cfg(windows)]
    pub(crate) fn new(_runtime_dir: &Path, key: &str) -> Self {
        Self {
            name: format!(r"\\.\pipe\{}", key),
        }
    }
}

/// 处理单个连接：读取一行命令并在匹配时广播事件。
async fn handle_connection<S>(stream: S, events: &broadcast::Sender<InstanceEvent>)
where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream.take(MAX_COMMAND_BYTES));
    let mut line = String::new();

    match tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            log::warn!("⚠️ 读取实例命令失败: {}", e);
            return;
        }
        Err(_) => {
            log::warn!("⏱️ 读取实例命令超时");
            return;
        }
    }

    if line.trim() != SHOW_SETTINGS_COMMAND {
        log::debug!("🚫 忽略未知实例命令: {:?}", line.trim());
        return;
    }

    log::info!("📋 收到第二实例启动通知");
    if events.send(InstanceEvent::SecondInstanceLaunched).is_err() {
        log::debug!("📋 暂无实例事件订阅者");
    }
}

#[cfg(unix)]
pub(crate) fn start_listener(
    endpoint: &Endpoint,
    events: broadcast::Sender<InstanceEvent>,
) -> io::Result<JoinHandle<()>> {
    use tokio::net::UnixListener;

    if std::fs::remove_file(&endpoint.path).is_ok() {
        log::debug!("🔄 已移除残留的实例套接字: {}", endpoint.path.display());
    }
    let listener = UnixListener::bind(&endpoint.path)?;
    log::info!("✅ 实例通道已监听: {}", endpoint.path.display());

    Ok(tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => handle_connection(stream, &events).await,
                Err(e) => {
                    log::warn!("⚠️ 接受实例连接失败: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }))
}

#[cfg(windows)]
pub(crate) fn start_listener(
    endpoint: &Endpoint,
    events: broadcast::Sender<InstanceEvent>,
) -> io::Result<JoinHandle<()>> {
    use tokio::net::windows::named_pipe::ServerOptions;

    let name = endpoint.name.clone();
    let mut server = ServerOptions::new().first_pipe_instance(true).create(&name)?;
    log::info!("✅ 实例通道已监听: {}", name);

    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = server.connect().await {
                log::warn!("⚠️ 接受实例连接失败: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
            let connected = server;
            server = match ServerOptions::new().create(&name) {
                Ok(next) => next,
                Err(e) => {
                    log::error!("❌ 重建命名管道失败，停止监听: {}", e);
                    handle_connection(connected, &events).await;
                    return;
                }
            };
            handle_connection(connected, &events).await;
        }
    }))
}

/// 向主实例发送命令，连接与写入总共受 1 秒超时约束。
pub(crate) async fn send_command(endpoint: &Endpoint, command: &str) -> io::Result<()> {
    let payload = format!("{}\n", command);
    match tokio::time::timeout(CONNECT_TIMEOUT, write_payload(endpoint, payload.as_bytes())).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "连接主实例超时")),
    }
}

#[cfg(unix)]
async fn write_payload(endpoint: &Endpoint, payload: &[u8]) -> io::Result<()> {
    let mut stream = tokio::net::UnixStream::connect(&endpoint.path).await?;
    stream.write_all(payload).await?;
    stream.shutdown().await
}

#[cfg(windows)]
async fn write_payload(endpoint: &Endpoint, payload: &[u8]) -> io::Result<()> {
    use tokio::net::windows::named_pipe::ClientOptions;

    const ERROR_PIPE_BUSY: i32 = 231;

    let mut client = loop {
        match ClientOptions::new().open(&endpoint.name) {
            Ok(client) => break client,
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(e) => return Err(e),
        }
    };
    client.write_all(payload).await?;
    client.flush().await
}

/// 释放通道占用的文件系统资源。
#[cfg(unix)]
pub(crate) fn cleanup(endpoint: &Endpoint) {
    if let Err(e) = std::fs::remove_file(&endpoint.path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("⚠️ 删除实例套接字失败: {}", e);
        }
    }
}

/// 命名管道随句柄关闭自动消失。
#[cfg(windows)]
pub(crate) fn cleanup(_endpoint: &Endpoint) {}

#[cfg(test)]
mod tests {
    use super::*;

    async fn events_for(payload: &'static [u8]) -> Vec<InstanceEvent> {
        let (tx, mut rx) = broadcast::channel(4);
        handle_connection(payload, &tx).await;
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn accepts_only_the_fixed_command() {
        assert_eq!(events_for(b"SHOW_SETTINGS\n").await, vec![InstanceEvent::SecondInstanceLaunched]);
        assert_eq!(events_for(b"  SHOW_SETTINGS  ").await, vec![InstanceEvent::SecondInstanceLaunched]);
        assert!(events_for(b"show_settings\n").await.is_empty());
        assert!(events_for(b"QUIT\n").await.is_empty());
        assert!(events_for(b"").await.is_empty());
    }

    #[tokio::test]
    async fn oversized_payload_is_truncated_and_ignored() {
        static LONG: [u8; 1024] = [b'A'; 1024];
        assert!(events_for(&LONG).await.is_empty());
    }
}
