use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 受信スレッドから消費側へ最新ペイロードだけを渡す1スロットのメールボックス
///
/// 消費側が取り出す前に次のペイロードが届いた場合は上書きする (latest wins)。
/// キューイングはしない。
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Option<String>>,
    available: AtomicBool,
    published: AtomicU64,
    overwritten: AtomicU64,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// ペイロードを書き込む。未取得の値があれば破棄される
    pub fn publish(&self, payload: String) {
        let mut slot = self.slot.lock();
        if slot.replace(payload).is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
        // スロット更新後にフラグを立てる (ロック中)
        self.available.store(true, Ordering::Release);
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// 新しいペイロードがあれば取り出す。フラグは同時に下ろす
    pub fn take(&self) -> Option<String> {
        if !self.available.swap(false, Ordering::Acquire) {
            return None;
        }
        self.slot.lock().take()
    }

    pub fn has_pending(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// これまでに書き込まれたペイロード数
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// 取り出される前に上書きされたペイロード数
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_mailbox() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.has_pending());
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn test_take_clears_flag() {
        let mailbox = Mailbox::new();
        mailbox.publish("a".to_string());
        assert!(mailbox.has_pending());
        assert_eq!(mailbox.take().as_deref(), Some("a"));
        assert!(!mailbox.has_pending());
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn test_latest_wins() {
        let mailbox = Mailbox::new();
        mailbox.publish("first".to_string());
        mailbox.publish("second".to_string());
        mailbox.publish("third".to_string());
        assert_eq!(mailbox.take().as_deref(), Some("third"));
        assert!(mailbox.take().is_none());
        assert_eq!(mailbox.published(), 3);
        assert_eq!(mailbox.overwritten(), 2);
    }

    #[test]
    fn test_drained_value_is_not_counted_as_overwritten() {
        let mailbox = Mailbox::new();
        mailbox.publish("a".to_string());
        mailbox.take();
        mailbox.publish("b".to_string());
        assert_eq!(mailbox.overwritten(), 0);
        assert_eq!(mailbox.take().as_deref(), Some("b"));
    }

    #[test]
    fn test_concurrent_producer_ends_with_last_value() {
        let mailbox = Arc::new(Mailbox::new());
        let producer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    mailbox.publish(i.to_string());
                }
            })
        };

        let mut last_seen = -1i64;
        while !producer.is_finished() {
            if let Some(v) = mailbox.take() {
                let v: i64 = v.parse().unwrap();
                // 取り出す値は単調増加
                assert!(v > last_seen);
                last_seen = v;
            }
        }
        producer.join().unwrap();
        if let Some(v) = mailbox.take() {
            last_seen = v.parse().unwrap();
        }
        assert_eq!(last_seen, 999);
    }
}
