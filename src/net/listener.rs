use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::error::ListenerError;
use crate::net::Mailbox;
use crate::protocol::MAX_DATAGRAM_SIZE;

/// stop() で受信スレッドの終了を待つ上限
pub const JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// 通常時の受信エラー後の待ち時間
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// 別スレッドで UDP を受信し、最新ペイロードをメールボックスに置く
pub struct UdpListener {
    socket: Option<Arc<UdpSocket>>,
    local_addr: SocketAddr,
    mailbox: Arc<Mailbox>,
    running: Arc<AtomicBool>,
    receive_errors: Arc<AtomicU64>,
    handle: Option<thread::JoinHandle<()>>,
}

impl UdpListener {
    /// 設定のアドレスでバインドして受信スレッドを起動
    pub fn start(config: &NetworkConfig) -> Result<Self, ListenerError> {
        let ip: IpAddr = config
            .bind_addr
            .parse()
            .map_err(|source| ListenerError::InvalidAddress {
                addr: config.bind_addr.clone(),
                source,
            })?;
        let addr = SocketAddr::new(ip, config.port);
        let socket = UdpSocket::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
        Self::from_socket(socket)
    }

    /// バインド済みソケットから起動
    pub fn from_socket(socket: UdpSocket) -> Result<Self, ListenerError> {
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);
        let mailbox = Arc::new(Mailbox::new());
        let running = Arc::new(AtomicBool::new(true));
        let receive_errors = Arc::new(AtomicU64::new(0));

        let handle = {
            let socket = socket.clone();
            let mailbox = mailbox.clone();
            let running = running.clone();
            let receive_errors = receive_errors.clone();
            thread::Builder::new()
                .name("skeleton-listener".to_string())
                .spawn(move || receive_loop(&socket, &mailbox, &running, &receive_errors))
                .map_err(ListenerError::Spawn)?
        };

        info!(addr = %local_addr, "skeleton listener started");

        Ok(Self {
            socket: Some(socket),
            local_addr,
            mailbox,
            running,
            receive_errors,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// ソケットを解放済みか
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    /// 停止要求以外の受信エラー数
    pub fn receive_errors(&self) -> u64 {
        self.receive_errors.load(Ordering::Relaxed)
    }

    /// 受信スレッドを止めてソケットを閉じる。何度呼んでもよい
    ///
    /// スレッドが時間内に終わらなければソケットは開いたまま残り、
    /// `is_closed()` は false を返す。次の `stop()` で再試行する。
    pub fn stop(&mut self) {
        if self.socket.is_none() {
            return;
        }
        self.running.store(false, Ordering::Release);

        // recv_from でブロック中のスレッドを起こす
        if let Some(socket) = self.socket.as_ref() {
            let target = wake_target(self.local_addr);
            if let Err(e) = socket.send_to(&[], target) {
                warn!(error = %e, %target, "wake datagram failed");
            }
        }

        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now() + JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            if !handle.is_finished() {
                warn!(
                    timeout_ms = JOIN_TIMEOUT.as_millis() as u64,
                    "listener thread did not exit in time, socket still open"
                );
                self.handle = Some(handle);
                return;
            }
            if handle.join().is_err() {
                warn!("listener thread panicked");
            }
        }

        // スレッドは終了済みなので、これが最後の参照
        self.socket = None;
        info!(addr = %self.local_addr, "skeleton listener stopped");
    }
}

impl Drop for UdpListener {
    fn drop(&mut self) {
        self.stop();
        if self.handle.take().is_some() {
            // ソケットは次の受信でスレッドが抜けたときに閉じる
            warn!(addr = %self.local_addr, "detaching listener thread");
        }
    }
}

fn receive_loop(
    socket: &UdpSocket,
    mailbox: &Mailbox,
    running: &AtomicBool,
    receive_errors: &AtomicU64,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    while running.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((n, _src)) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                let payload = String::from_utf8_lossy(&buf[..n]).into_owned();
                mailbox.publish(payload);
            }
            // 停止要求によるエラーは握りつぶす
            Err(_) if !running.load(Ordering::Acquire) => break,
            Err(e) => {
                receive_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "udp receive failed");
                thread::sleep(RECV_ERROR_BACKOFF);
            }
        }
    }
    debug!("listener thread exiting");
}

/// ワイルドカードアドレスにはループバック経由で送る
fn wake_target(local: SocketAddr) -> SocketAddr {
    let ip = match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, local.port())
}
