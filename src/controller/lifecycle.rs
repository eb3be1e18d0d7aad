use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

use super::store::CacheStorage;
use crate::error::{Error, Result};

/// 缓存代的状态
///
/// installing → installed(waiting) → activating → activated → redundant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

#[derive(Debug, Default)]
struct Lifecycle {
    states: BTreeMap<String, GenerationState>,
    skip_waiting: bool,
    clients: usize,
}

impl Lifecycle {
    fn find(&self, state: GenerationState) -> Option<&str> {
        self.states
            .iter()
            .find(|(_, s)| **s == state)
            .map(|(generation, _)| generation.as_str())
    }

    fn active(&self) -> Option<&str> {
        self.find(GenerationState::Activated)
    }

    fn waiting(&self) -> Option<&str> {
        self.find(GenerationState::Installed)
    }

    fn installing(&self) -> Option<&str> {
        self.find(GenerationState::Installing)
    }

    fn mark(&mut self, from: GenerationState, to: GenerationState) {
        self.states
            .values_mut()
            .filter(|state| **state == from)
            .for_each(|state| *state = to);
    }

    /// 返回 false 表示该代已经激活，无需安装
    fn begin_install(&mut self, generation: &str) -> bool {
        if self.active() == Some(generation) {
            return false;
        }
        self.mark(GenerationState::Installing, GenerationState::Redundant);
        self.states
            .insert(generation.to_string(), GenerationState::Installing);
        true
    }

    fn finish_install(&mut self, generation: &str) -> Result<()> {
        if self.states.get(generation) != Some(&GenerationState::Installing) {
            return Err(Error::Superseded(generation.to_string()));
        }
        self.mark(GenerationState::Installed, GenerationState::Redundant);
        self.states
            .insert(generation.to_string(), GenerationState::Installed);
        Ok(())
    }

    fn begin_activate(&mut self) -> Result<String> {
        let generation = self.waiting().ok_or(Error::NothingWaiting)?.to_string();
        self.states
            .insert(generation.clone(), GenerationState::Activating);
        Ok(generation)
    }

    fn finish_activate(&mut self, generation: &str) {
        // 只保留最近一轮被替换的记录
        self.states
            .retain(|_, state| *state != GenerationState::Redundant);
        self.mark(GenerationState::Activated, GenerationState::Redundant);
        self.states
            .insert(generation.to_string(), GenerationState::Activated);
        self.skip_waiting = false;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub generation: String,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleSnapshot {
    pub active: Option<String>,
    pub waiting: Option<String>,
    pub installing: Option<String>,
    pub skip_waiting: bool,
    pub clients: usize,
    pub stores: Vec<StoreSummary>,
}

/// 各代的生命周期与缓存存储
#[derive(Debug, Default)]
pub struct Registration {
    lifecycle: Mutex<Lifecycle>,
    storage: CacheStorage,
}

impl Registration {
    pub fn new(storage: CacheStorage) -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle::default()),
            storage,
        }
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn active_generation(&self) -> Option<String> {
        self.lifecycle.lock().active().map(str::to_string)
    }

    pub fn waiting_generation(&self) -> Option<String> {
        self.lifecycle.lock().waiting().map(str::to_string)
    }

    pub fn state_of(&self, generation: &str) -> Option<GenerationState> {
        self.lifecycle.lock().states.get(generation).copied()
    }

    /// 该代已激活、等待中或正在安装
    pub fn is_current(&self, generation: &str) -> bool {
        let lifecycle = self.lifecycle.lock();
        [lifecycle.active(), lifecycle.waiting(), lifecycle.installing()]
            .contains(&Some(generation))
    }

    pub(crate) fn begin_install(&self, generation: &str) -> bool {
        self.lifecycle.lock().begin_install(generation)
    }

    pub(crate) fn finish_install(&self, generation: &str) -> Result<()> {
        self.lifecycle.lock().finish_install(generation)
    }

    /// 等待中的代是否可以直接激活
    pub fn should_activate(&self) -> bool {
        let lifecycle = self.lifecycle.lock();
        lifecycle.waiting().is_some()
            && (lifecycle.active().is_none() || lifecycle.skip_waiting || lifecycle.clients == 0)
    }

    /// 激活等待中的代，并删除其它代的缓存
    pub fn activate(&self) -> Result<String> {
        let mut lifecycle = self.lifecycle.lock();
        self.activate_locked(&mut lifecycle)
    }

    fn activate_locked(&self, lifecycle: &mut Lifecycle) -> Result<String> {
        let generation = lifecycle.begin_activate()?;
        info!("Activating cache generation {}", generation);

        // 正在安装的代保留自己的缓存，激活时再清理
        let installing = lifecycle.installing().map(str::to_string);
        for name in self.storage.keys() {
            if name == generation || Some(&name) == installing.as_ref() {
                continue;
            }
            if self.storage.delete(&name) {
                info!("Deleted stale cache {}", name);
            }
        }
        self.storage.open(&generation);

        lifecycle.finish_activate(&generation);
        info!(
            "Cache generation {} activated, claimed {} clients",
            generation, lifecycle.clients
        );
        Ok(generation)
    }

    /// 标记跳过等待，若已有等待中的代则立即激活
    pub fn skip_waiting(&self) -> Result<Option<String>> {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.skip_waiting = true;
        if lifecycle.waiting().is_none() {
            debug!("Skip waiting flagged, no generation waiting yet");
            return Ok(None);
        }
        self.activate_locked(&mut lifecycle).map(Some)
    }

    pub(crate) fn set_skip_waiting(&self) {
        self.lifecycle.lock().skip_waiting = true;
    }

    pub fn attach_client(self: &Arc<Self>) -> ClientHandle {
        self.lifecycle.lock().clients += 1;
        ClientHandle {
            registration: self.clone(),
        }
    }

    fn release_client(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.clients = lifecycle.clients.saturating_sub(1);
        if lifecycle.clients > 0 || lifecycle.waiting().is_none() {
            return;
        }
        debug!("Last client released, activating waiting generation");
        if let Err(err) = self.activate_locked(&mut lifecycle) {
            error!("Failed to activate waiting generation: {}", err);
        }
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        let lifecycle = self.lifecycle.lock();
        let stores = self
            .storage
            .keys()
            .into_iter()
            .filter_map(|generation| {
                self.storage.get(&generation).map(|store| StoreSummary {
                    entries: store.len(),
                    generation,
                })
            })
            .collect();
        LifecycleSnapshot {
            active: lifecycle.active().map(str::to_string),
            waiting: lifecycle.waiting().map(str::to_string),
            installing: lifecycle.installing().map(str::to_string),
            skip_waiting: lifecycle.skip_waiting,
            clients: lifecycle.clients,
            stores,
        }
    }
}

/// 受控页面
///
/// 存在任意句柄时，新安装的代保持等待；最后一个句柄释放时激活等待中的代。
#[derive(Debug)]
pub struct ClientHandle {
    registration: Arc<Registration>,
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.registration.release_client();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed(registration: &Registration, generation: &str) {
        assert!(registration.begin_install(generation));
        registration.storage().open(generation);
        registration.finish_install(generation).unwrap();
    }

    #[test]
    fn test_install_then_activate() {
        let registration = Registration::default();
        installed(&registration, "v1");

        assert_eq!(registration.state_of("v1"), Some(GenerationState::Installed));
        assert_eq!(registration.waiting_generation().as_deref(), Some("v1"));
        assert!(registration.should_activate());

        assert_eq!(registration.activate().unwrap(), "v1");
        assert_eq!(registration.state_of("v1"), Some(GenerationState::Activated));
        assert!(registration.waiting_generation().is_none());
    }

    #[test]
    fn test_activate_sweeps_old_generations() {
        let registration = Registration::default();
        installed(&registration, "v1");
        registration.activate().unwrap();
        installed(&registration, "v2");
        registration.activate().unwrap();

        assert_eq!(registration.storage().keys(), vec!["v2"]);
        assert_eq!(registration.state_of("v1"), Some(GenerationState::Redundant));
        assert_eq!(registration.active_generation().as_deref(), Some("v2"));

        // 再下一轮时之前的 redundant 记录被清理
        installed(&registration, "v3");
        registration.activate().unwrap();
        assert_eq!(registration.state_of("v1"), None);
        assert_eq!(registration.state_of("v2"), Some(GenerationState::Redundant));
    }

    #[test]
    fn test_is_current_covers_every_live_stage() {
        let registration = Registration::default();
        assert!(registration.begin_install("v1"));
        assert!(registration.is_current("v1"));

        registration.finish_install("v1").unwrap();
        assert!(registration.is_current("v1"));

        registration.activate().unwrap();
        assert!(registration.is_current("v1"));
        assert!(!registration.is_current("v2"));

        installed(&registration, "v2");
        registration.activate().unwrap();
        assert!(!registration.is_current("v1"));
    }

    #[test]
    fn test_activate_without_waiting() {
        let registration = Registration::default();
        assert!(matches!(registration.activate(), Err(Error::NothingWaiting)));
    }

    #[test]
    fn test_reinstall_active_is_noop() {
        let registration = Registration::default();
        installed(&registration, "v1");
        registration.activate().unwrap();
        assert!(!registration.begin_install("v1"));
    }

    #[test]
    fn test_newer_install_supersedes_older() {
        let registration = Registration::default();
        assert!(registration.begin_install("v1"));
        assert!(registration.begin_install("v2"));

        assert!(matches!(
            registration.finish_install("v1"),
            Err(Error::Superseded(_))
        ));
        registration.finish_install("v2").unwrap();
        assert_eq!(registration.state_of("v1"), Some(GenerationState::Redundant));
        assert_eq!(registration.waiting_generation().as_deref(), Some("v2"));
    }

    #[test]
    fn test_activation_keeps_installing_store() {
        let registration = Registration::default();
        installed(&registration, "v1");
        assert!(registration.begin_install("v2"));
        registration.storage().open("v2");
        registration.activate().unwrap();

        assert_eq!(registration.storage().keys(), vec!["v1", "v2"]);
    }

    #[test]
    fn test_clients_hold_waiting_generation() {
        let registration = Arc::new(Registration::default());
        installed(&registration, "v1");
        registration.activate().unwrap();

        let first = registration.attach_client();
        let second = registration.attach_client();
        installed(&registration, "v2");
        assert!(!registration.should_activate());

        drop(first);
        assert_eq!(registration.active_generation().as_deref(), Some("v1"));

        drop(second);
        assert_eq!(registration.active_generation().as_deref(), Some("v2"));
        assert!(!registration.storage().has("v1"));
        assert_eq!(registration.snapshot().clients, 0);
    }

    #[test]
    fn test_skip_waiting() {
        let registration = Arc::new(Registration::default());
        installed(&registration, "v1");
        registration.activate().unwrap();
        let _client = registration.attach_client();

        // 没有等待中的代时只做标记
        assert_eq!(registration.skip_waiting().unwrap(), None);
        installed(&registration, "v2");
        assert!(registration.should_activate());

        registration.activate().unwrap();
        assert!(!registration.snapshot().skip_waiting);

        installed(&registration, "v3");
        assert!(!registration.should_activate());
        assert_eq!(registration.skip_waiting().unwrap().as_deref(), Some("v3"));
    }

    #[test]
    fn test_snapshot() {
        let registration = Arc::new(Registration::default());
        installed(&registration, "v1");
        registration.activate().unwrap();
        let _client = registration.attach_client();

        let snapshot = registration.snapshot();
        assert_eq!(snapshot.active.as_deref(), Some("v1"));
        assert!(snapshot.waiting.is_none());
        assert_eq!(snapshot.clients, 1);
        assert_eq!(snapshot.stores.len(), 1);
        assert_eq!(snapshot.stores[0].generation, "v1");
        assert_eq!(snapshot.stores[0].entries, 0);
    }
}
