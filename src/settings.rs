// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 监视设置: 监视列表 + 每类动作 + 通知邮箱
// 远端/本地偏好存储, 以及把协作方错误转换为状态字符串的设置服务

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::catalog::ClassCatalog;
use crate::config::is_placeholder_endpoint;
use crate::error::{Result, WatchError};

/// 设置面板中默认展示的类别
pub const DEFAULT_WATCH_CLASSES: [&str; 5] = ["person", "car", "dog", "cat", "bottle"];
pub const DEFAULT_NOTIFICATION_EMAIL: &str = "user@example.com";

/// 单个类别检测到时的动作
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectActions {
    #[serde(default)]
    pub count: bool,
    #[serde(rename = "notifyOnDetect", default)]
    pub notify_on_detect: bool,
    #[serde(rename = "recordOnDetect", default)]
    pub record_on_detect: bool,
}

/// 监视配置
///
/// 序列化格式与偏好存储的线上格式一致:
/// `{"watchedObjects": {..}, "objectActions": {..}, "notificationEmail": ".."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfiguration {
    #[serde(rename = "watchedObjects", default)]
    pub watched_objects: BTreeMap<String, bool>,
    #[serde(rename = "objectActions", default)]
    pub object_actions: BTreeMap<String, ObjectActions>,
    #[serde(rename = "notificationEmail", default)]
    pub notification_email: String,
}

impl Default for WatchConfiguration {
    fn default() -> Self {
        Self::with_classes(&DEFAULT_WATCH_CLASSES)
    }
}

impl WatchConfiguration {
    /// 给定监视列表, 所有开关为 false
    pub fn with_classes(classes: &[&str]) -> Self {
        Self {
            watched_objects: classes.iter().map(|c| (c.to_string(), false)).collect(),
            object_actions: classes
                .iter()
                .map(|c| (c.to_string(), ObjectActions::default()))
                .collect(),
            notification_email: DEFAULT_NOTIFICATION_EMAIL.to_string(),
        }
    }

    /// 类别在监视列表中, 并且已开启监视
    pub fn is_watched(&self, class_name: &str) -> bool {
        self.watched_objects.get(class_name).copied().unwrap_or(false)
    }

    /// 未配置的类别返回全 false
    pub fn actions(&self, class_name: &str) -> ObjectActions {
        self.object_actions
            .get(class_name)
            .copied()
            .unwrap_or_default()
    }

    pub fn watch(&mut self, class_name: &str, watched: bool) -> &mut Self {
        self.watched_objects.insert(class_name.to_string(), watched);
        self
    }

    pub fn set_actions(&mut self, class_name: &str, actions: ObjectActions) -> &mut Self {
        self.object_actions.insert(class_name.to_string(), actions);
        self
    }

    /// 把加载到的偏好合并到当前监视列表上
    ///
    /// - 只保留当前监视列表中的类别, 载入数据里缺失的类别视为 false
    /// - 载入数据没有邮箱时沿用当前邮箱
    pub fn merged(&self, loaded: &WatchConfiguration) -> WatchConfiguration {
        let watched_objects = self
            .watched_objects
            .keys()
            .map(|cls| (cls.clone(), loaded.is_watched(cls)))
            .collect();
        let object_actions = self
            .watched_objects
            .keys()
            .map(|cls| (cls.clone(), loaded.actions(cls)))
            .collect();
        let notification_email = if loaded.notification_email.is_empty() {
            self.notification_email.clone()
        } else {
            loaded.notification_email.clone()
        };
        WatchConfiguration {
            watched_objects,
            object_actions,
            notification_email,
        }
    }

    /// 所有类别名都必须在类别表中
    pub fn validate(&self, catalog: &ClassCatalog) -> Result<()> {
        for name in self.watched_objects.keys().chain(self.object_actions.keys()) {
            catalog.require(name)?;
        }
        Ok(())
    }
}

/// 进程内共享的监视配置
///
/// 更新是整体替换; 读者拿到的是一次快照, 一帧内不会看到半更新的状态
#[derive(Debug, Clone, Default)]
pub struct SharedWatchConfig {
    inner: Arc<RwLock<Arc<WatchConfiguration>>>,
}

impl SharedWatchConfig {
    pub fn new(config: WatchConfiguration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<WatchConfiguration> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, config: WatchConfiguration) {
        let config = Arc::new(config);
        match self.inner.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }
}

/// 偏好存储 (远端或本地)
pub trait PreferenceStore: Send {
    fn load_preferences(&self) -> Result<WatchConfiguration>;

    /// 返回存储端的确认消息
    fn save_preferences(&self, config: &WatchConfiguration) -> Result<String>;

    /// 端点仍是占位符时为 false
    fn is_configured(&self) -> bool {
        true
    }
}

/// 通过 HTTP 可调用函数读写偏好
///
/// 请求体 `{"data": {...}}`, 请求头 `Authorization: Bearer <token>`
pub struct HttpPreferenceStore {
    load_url: String,
    save_url: String,
    token: String,
    agent: ureq::Agent,
}

impl HttpPreferenceStore {
    pub fn new(load_url: impl Into<String>, save_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_timeout(load_url, save_url, token, Duration::from_secs(10))
    }

    pub fn with_timeout(
        load_url: impl Into<String>,
        save_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            load_url: load_url.into(),
            save_url: save_url.into(),
            token: token.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn call(&self, url: &str, data: Value) -> Result<Value> {
        let response = self
            .agent
            .post(url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Content-Type", "application/json")
            .send_json(json!({ "data": data }))?;
        Ok(response.into_json::<Value>()?)
    }
}

/// 解析读取接口的响应: `{"result": ..}` / `{"error": ..}` / 裸对象
pub fn parse_load_response(body: Value) -> Result<WatchConfiguration> {
    if let Some(result) = body.get("result") {
        return Ok(serde_json::from_value(result.clone())?);
    }
    if let Some(error) = body.get("error") {
        return Err(WatchError::Collaborator(format!(
            "preference store returned an error: {}",
            error
        )));
    }
    Ok(serde_json::from_value(body)?)
}

/// 解析保存接口的响应, 缺省消息为 `OK`
pub fn parse_save_response(body: &Value) -> String {
    body.get("message")
        .or_else(|| body.get("result").and_then(|r| r.get("message")))
        .and_then(Value::as_str)
        .unwrap_or("OK")
        .to_string()
}

impl PreferenceStore for HttpPreferenceStore {
    fn load_preferences(&self) -> Result<WatchConfiguration> {
        info!(url = %self.load_url, "loading preferences");
        parse_load_response(self.call(&self.load_url, json!({}))?)
    }

    fn save_preferences(&self, config: &WatchConfiguration) -> Result<String> {
        info!(url = %self.save_url, "saving preferences");
        let body = self.call(&self.save_url, serde_json::to_value(config)?)?;
        Ok(parse_save_response(&body))
    }

    fn is_configured(&self) -> bool {
        !is_placeholder_endpoint(&self.load_url) && !is_placeholder_endpoint(&self.save_url)
    }
}

/// 本地 JSON 文件偏好存储
#[derive(Debug, Clone)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
}

impl JsonFilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn load_preferences(&self) -> Result<WatchConfiguration> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "preferences file not found, using defaults");
            return Ok(WatchConfiguration::default());
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save_preferences(&self, config: &WatchConfiguration) -> Result<String> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
        Ok(format!("written to {}", self.path.display()))
    }
}

/// 设置服务
///
/// 协作方错误只转换为状态字符串, 永远不会进入帧处理路径
pub struct SettingsService {
    store: Box<dyn PreferenceStore>,
    shared: SharedWatchConfig,
    catalog: ClassCatalog,
}

impl SettingsService {
    pub fn new(store: Box<dyn PreferenceStore>, shared: SharedWatchConfig) -> Self {
        Self {
            store,
            shared,
            catalog: ClassCatalog::coco().clone(),
        }
    }

    /// 校验类别名用的类别表 (默认 COCO)
    pub fn with_catalog(mut self, catalog: ClassCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn shared(&self) -> &SharedWatchConfig {
        &self.shared
    }

    /// 加载并合并偏好, 成功时返回合并后配置的 JSON 文本
    pub fn load(&self) -> String {
        if !self.store.is_configured() {
            warn!("preference store endpoint is a placeholder");
            return "Error: preference store not configured. Using default/current settings.".into();
        }
        match self.store.load_preferences() {
            Ok(loaded) => {
                let merged = self.shared.snapshot().merged(&loaded);
                let text = serde_json::to_string_pretty(&merged)
                    .unwrap_or_else(|e| format!("Settings loaded ({})", e));
                self.shared.replace(merged);
                info!("preferences loaded");
                text
            }
            Err(e) => {
                warn!(error = %e, "failed to load preferences");
                format!("Error loading settings: {}", e)
            }
        }
    }

    /// 保存新配置; 只有存储端接受后才替换当前配置
    pub fn save(&self, config: WatchConfiguration) -> String {
        if !self.store.is_configured() {
            warn!("preference store endpoint is a placeholder");
            return "Error: preference store not configured. Settings not saved.".into();
        }
        if let Err(e) = config.validate(&self.catalog) {
            warn!(error = %e, "rejected preferences");
            return format!("Error saving settings: {}", e);
        }
        match self.store.save_preferences(&config) {
            Ok(message) => {
                self.shared.replace(config);
                info!(%message, "preferences saved");
                format!("Settings saved successfully: {}", message)
            }
            Err(e) => {
                warn!(error = %e, "failed to save preferences");
                format!("Error saving settings: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    impl PreferenceStore for FailingStore {
        fn load_preferences(&self) -> Result<WatchConfiguration> {
            Err(WatchError::Collaborator("401 unauthorized".into()))
        }

        fn save_preferences(&self, _: &WatchConfiguration) -> Result<String> {
            Err(WatchError::Collaborator("connection refused".into()))
        }
    }

    #[test]
    fn test_default_configuration() {
        let cfg = WatchConfiguration::default();
        assert_eq!(cfg.watched_objects.len(), 5);
        assert!(!cfg.is_watched("person"));
        assert!(!cfg.is_watched("giraffe"));
        assert_eq!(cfg.actions("car"), ObjectActions::default());
        assert_eq!(cfg.notification_email, "user@example.com");
    }

    #[test]
    fn test_wire_format() {
        let mut cfg = WatchConfiguration::with_classes(&["car"]);
        cfg.watch("car", true).set_actions(
            "car",
            ObjectActions {
                count: true,
                notify_on_detect: true,
                record_on_detect: false,
            },
        );
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["watchedObjects"]["car"], json!(true));
        assert_eq!(v["objectActions"]["car"]["notifyOnDetect"], json!(true));
        assert_eq!(v["objectActions"]["car"]["recordOnDetect"], json!(false));
        assert_eq!(v["notificationEmail"], json!("user@example.com"));
    }

    #[test]
    fn test_merge_fills_missing_with_false() {
        let current = WatchConfiguration::default();
        let loaded: WatchConfiguration = serde_json::from_value(json!({
            "watchedObjects": {"dog": true, "giraffe": true},
            "objectActions": {"dog": {"count": true}}
        }))
        .unwrap();
        let merged = current.merged(&loaded);
        assert!(merged.is_watched("dog"));
        assert!(merged.actions("dog").count);
        assert!(!merged.actions("dog").notify_on_detect);
        assert!(!merged.is_watched("person"));
        assert!(!merged.watched_objects.contains_key("giraffe"));
        assert_eq!(merged.notification_email, "user@example.com");
    }

    #[test]
    fn test_parse_load_response() {
        let wrapped = json!({"result": {"notificationEmail": "a@b.c"}});
        assert_eq!(parse_load_response(wrapped).unwrap().notification_email, "a@b.c");
        let bare = json!({"watchedObjects": {"cat": true}});
        assert!(parse_load_response(bare).unwrap().is_watched("cat"));
        let err = json!({"error": {"message": "internal"}});
        assert!(matches!(parse_load_response(err), Err(WatchError::Collaborator(_))));
    }

    #[test]
    fn test_parse_save_response() {
        assert_eq!(parse_save_response(&json!({"message": "Preferences updated successfully."})), "Preferences updated successfully.");
        assert_eq!(parse_save_response(&json!({"result": {"message": "done"}})), "done");
        assert_eq!(parse_save_response(&json!({})), "OK");
    }

    #[test]
    fn test_shared_replace_is_wholesale() {
        let shared = SharedWatchConfig::default();
        let before = shared.snapshot();
        let mut next = WatchConfiguration::default();
        next.watch("person", true);
        shared.replace(next);
        assert!(!before.is_watched("person"));
        assert!(shared.snapshot().is_watched("person"));
    }

    #[test]
    fn test_file_store_roundtrip_through_service() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs").join("watch.json");
        let shared = SharedWatchConfig::default();
        let service = SettingsService::new(Box::new(JsonFilePreferenceStore::new(&path)), shared.clone());

        // 文件不存在: 默认值
        assert!(service.load().contains("notificationEmail"));

        let mut cfg = WatchConfiguration::default();
        cfg.watch("bottle", true);
        cfg.notification_email = "ops@example.com".into();
        let status = service.save(cfg);
        assert!(status.starts_with("Settings saved successfully"));
        assert!(shared.snapshot().is_watched("bottle"));

        shared.replace(WatchConfiguration::default());
        service.load();
        let now = shared.snapshot();
        assert!(now.is_watched("bottle"));
        assert_eq!(now.notification_email, "ops@example.com");
    }

    #[test]
    fn test_failures_become_status_strings() {
        let shared = SharedWatchConfig::default();
        let service = SettingsService::new(Box::new(FailingStore), shared.clone());

        assert!(service.load().starts_with("Error loading settings"));
        let mut cfg = WatchConfiguration::default();
        cfg.watch("cat", true);
        assert!(service.save(cfg).starts_with("Error saving settings"));
        // 保存失败不替换当前配置
        assert!(!shared.snapshot().is_watched("cat"));
    }

    #[test]
    fn test_placeholder_endpoint_not_configured() {
        let store = HttpPreferenceStore::new(
            "YOUR_GET_USER_PREFERENCES_FUNCTION_URL",
            "YOUR_SET_USER_PREFERENCES_FUNCTION_URL",
            "token",
        );
        assert!(!store.is_configured());
        let service = SettingsService::new(Box::new(store), SharedWatchConfig::default());
        assert!(service.load().contains("not configured"));
        assert!(service.save(WatchConfiguration::default()).contains("not configured"));
    }

    #[test]
    fn test_validate_against_catalog() {
        let catalog = ClassCatalog::coco();
        assert!(WatchConfiguration::default().validate(catalog).is_ok());

        let mut cfg = WatchConfiguration::default();
        cfg.set_actions("unicorn", ObjectActions::default());
        match cfg.validate(catalog) {
            Err(WatchError::UnknownClassName(name)) => assert_eq!(name, "unicorn"),
            other => panic!("unexpected: {:?}", other),
        }

        let custom = ClassCatalog::new(&["widget"], 1);
        assert!(WatchConfiguration::with_classes(&["widget"]).validate(&custom).is_ok());
        assert!(WatchConfiguration::default().validate(&custom).is_err());
    }

    #[test]
    fn test_save_rejects_unknown_class_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.json");
        let shared = SharedWatchConfig::default();
        let service = SettingsService::new(Box::new(JsonFilePreferenceStore::new(&path)), shared.clone());

        let mut cfg = WatchConfiguration::default();
        cfg.watch("unicorn", true);
        let status = service.save(cfg);
        assert_eq!(status, "Error saving settings: unknown class name `unicorn`");
        // 不写存储, 不替换当前配置
        assert!(!path.exists());
        assert!(!shared.snapshot().is_watched("unicorn"));

        // 换成自定义类别表后同名类别可以保存
        let service = SettingsService::new(Box::new(JsonFilePreferenceStore::new(&path)), shared.clone())
            .with_catalog(ClassCatalog::new(&["unicorn"], 1));
        let status = service.save(WatchConfiguration::with_classes(&["unicorn"]));
        assert!(status.starts_with("Settings saved successfully"));
        assert!(path.exists());
    }
}
