// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 外部协作方: 检测通知 + 录像触发
// 尽力而为: 失败只记录日志, 不会回传到帧处理路径

use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Local};
use crossbeam_channel::{Sender, TrySendError};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::is_placeholder_endpoint;
use crate::error::Result;

/// 待发送通知的队列长度, 队列满时丢弃新通知
pub const NOTIFY_QUEUE_LEN: usize = 64;

/// 检测通知
pub trait Notifier: Send {
    fn notify(&self, class_name: &str, recipient: &str);
}

/// 录像触发
pub trait RecordTrigger: Send {
    fn trigger(&self, class_name: &str);
}

/// 邮件通知请求体
pub fn email_payload(class_name: &str, recipient: &str, at: DateTime<Local>) -> Value {
    json!({
        "data": {
            "recipient_email": recipient,
            "subject": format!("Object Detection Alert: {}", class_name),
            "body": format!(
                "A '{}' has been detected by your application at {}.",
                class_name,
                at.format("%Y-%m-%d %H:%M:%S")
            ),
        }
    })
}

/// 实际投递一条通知 (在后台线程中调用, 可以阻塞)
pub trait EmailSender: Send + 'static {
    fn send(&self, payload: &Value) -> Result<Value>;
}

/// 调用远端邮件函数
pub struct HttpEmailSender {
    url: String,
    token: String,
    agent: ureq::Agent,
}

impl HttpEmailSender {
    pub fn new(url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl EmailSender for HttpEmailSender {
    fn send(&self, payload: &Value) -> Result<Value> {
        if is_placeholder_endpoint(&self.url) {
            info!(%payload, "email endpoint not configured, simulating delivery");
            return Ok(json!({ "result": { "message": "simulated" } }));
        }
        let response = self
            .agent
            .post(&self.url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Content-Type", "application/json")
            .send_json(payload)?;
        Ok(response.into_json::<Value>()?)
    }
}

/// 邮件通知
///
/// `notify` 只负责入队, 由后台线程逐条投递; 帧处理线程从不等待网络
pub struct HttpEmailNotifier {
    tx: Option<Sender<(String, Value)>>,
    worker: Option<JoinHandle<()>>,
}

impl HttpEmailNotifier {
    pub fn new(url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::spawn(HttpEmailSender::new(url, token, timeout))
    }

    /// 启动后台投递线程
    pub fn spawn<S: EmailSender>(sender: S) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded::<(String, Value)>(NOTIFY_QUEUE_LEN);
        let worker = std::thread::Builder::new()
            .name("notifier".into())
            .spawn(move || {
                for (class, payload) in rx {
                    match sender.send(&payload) {
                        Ok(reply) => info!(class = %class, %reply, "notification sent"),
                        Err(e) => warn!(class = %class, error = %e, "notification failed"),
                    }
                }
                debug!("notifier stopped");
            })?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }
}

impl Notifier for HttpEmailNotifier {
    fn notify(&self, class_name: &str, recipient: &str) {
        if recipient.is_empty() {
            warn!(class = class_name, "no notification email configured, skipping");
            return;
        }
        let Some(tx) = &self.tx else {
            return;
        };
        let payload = email_payload(class_name, recipient, Local::now());
        match tx.try_send((class_name.to_string(), payload)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(class = class_name, "notification queue full, dropped"),
            Err(TrySendError::Disconnected(_)) => warn!(class = class_name, "notifier stopped, dropped"),
        }
    }
}

impl Drop for HttpEmailNotifier {
    /// 关闭队列并等待已入队的通知投递完
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("notifier thread panicked");
            }
        }
    }
}

/// 仅记录日志的通知
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, class_name: &str, recipient: &str) {
        if recipient.is_empty() {
            warn!(class = class_name, "no notification email configured, skipping");
            return;
        }
        let payload = email_payload(class_name, recipient, Local::now());
        info!(class = class_name, %payload, "notification");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecordTrigger;

impl RecordTrigger for LogRecordTrigger {
    fn trigger(&self, class_name: &str) {
        info!(class = class_name, "RECORDING TRIGGER: Detected {}", class_name);
    }
}
