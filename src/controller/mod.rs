//! 离线缓存控制器
//!
//! 宿主环境负责在合适的时机调用 `on_install`、`on_activate`、`on_fetch`
//! 和 `on_message`，控制器本身不注册任何全局事件。

use std::{fs, sync::Arc};

use axum::body::Bytes;
use futures::future::join_all;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use url::Url;

use crate::{config::SettingController, error::Result};

pub mod fetch;
pub mod lifecycle;
pub mod message;
pub mod policy;
pub mod request;
pub mod response;
pub mod store;

pub use fetch::{FetchError, Fetcher};
pub use lifecycle::{ClientHandle, GenerationState, LifecycleSnapshot, Registration};
pub use message::ControlMessage;
pub use policy::{AssetMatcher, ExclusionRules, InterceptPolicy, Passthrough};
pub use request::{FetchRequest, RequestKey};
pub use response::{CapturedResponse, OFFLINE_DOCUMENT, ResponseKind};
pub use store::{CacheStorage, CacheStore};

/// 响应来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
    Passthrough(Passthrough),
    Fallback,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Network => "network",
            Source::Passthrough(_) => "passthrough",
            Source::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Served {
    pub response: CapturedResponse,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: String,
    pub seeded: usize,
    /// 预缓存失败的资源路径
    pub failed: Vec<String>,
}

pub struct CacheController<F> {
    registration: Arc<Registration>,
    fetcher: F,
    policy: InterceptPolicy,
    origin: Url,
    shell: Vec<String>,
    skip_waiting: bool,
    offline_document: Bytes,
    writes: TaskTracker,
}

impl<F: Fetcher> CacheController<F> {
    pub fn new(settings: &SettingController, fetcher: F) -> Result<Self> {
        let policy = InterceptPolicy::new(
            ExclusionRules::new(&settings.exclude_origins, &settings.allow_origins)?,
            AssetMatcher::new(&settings.static_dirs)?,
        );
        let offline_document = match &settings.offline_page {
            Some(path) => Bytes::from(fs::read(path)?),
            None => Bytes::from_static(OFFLINE_DOCUMENT.as_bytes()),
        };
        Ok(Self {
            registration: Arc::new(Registration::new(CacheStorage::new())),
            fetcher,
            policy,
            origin: Url::parse(&settings.origin)?,
            shell: settings.shell.clone(),
            skip_waiting: settings.skip_waiting,
            offline_document,
            writes: TaskTracker::new(),
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    pub fn storage(&self) -> &CacheStorage {
        self.registration.storage()
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.registration.snapshot()
    }

    pub fn attach_client(&self) -> ClientHandle {
        self.registration.attach_client()
    }

    /// 安装新的一代：创建缓存并预缓存外壳资源
    ///
    /// 单个资源失败只记录日志，不影响其它资源和安装本身。
    /// 该代已经激活时返回 `None`。
    pub async fn on_install(&self, generation: &str) -> Result<Option<InstallReport>> {
        if !self.registration.begin_install(generation) {
            info!("Cache generation {} is already active", generation);
            return Ok(None);
        }
        info!("Installing cache generation {}", generation);

        let store = self.storage().open(generation);
        let results = join_all(self.shell.iter().map(|path| self.seed(&store, path))).await;
        let failed: Vec<String> = self
            .shell
            .iter()
            .zip(results)
            .filter(|(_, seeded)| !seeded)
            .map(|(path, _)| path.clone())
            .collect();
        let report = InstallReport {
            generation: generation.to_string(),
            seeded: self.shell.len() - failed.len(),
            failed,
        };

        self.registration.finish_install(generation)?;
        if self.skip_waiting {
            self.registration.set_skip_waiting();
        }
        info!(
            "Cache generation {} installed, seeded {}/{} resources",
            generation,
            report.seeded,
            self.shell.len()
        );
        Ok(Some(report))
    }

    async fn seed(&self, store: &CacheStore, path: &str) -> bool {
        let url = match self.origin.join(path) {
            Ok(url) => url,
            Err(err) => {
                warn!("Skip seeding {}: {}", path, err);
                return false;
            }
        };
        let request = FetchRequest::get(url);
        match self.fetcher.fetch(&request).await {
            Ok(response) if response.status.is_success() => {
                store.put(request.key(), response);
                debug!("Seeded {}", request.url);
                true
            }
            Ok(response) => {
                warn!("Seeding {} failed with status {}", request.url, response.status);
                false
            }
            Err(err) => {
                warn!("Seeding {} failed: {}", request.url, err);
                false
            }
        }
    }

    /// 激活等待中的代，返回其代号
    pub fn on_activate(&self) -> Result<String> {
        self.registration.activate()
    }

    /// 安装，并在没有受控页面或允许跳过等待时立即激活
    ///
    /// 返回新激活的代号；保持等待时返回 `None`。
    pub async fn update(&self, generation: &str) -> Result<Option<String>> {
        if self.on_install(generation).await?.is_none() {
            return Ok(None);
        }
        if !self.registration.should_activate() {
            info!(
                "Cache generation {} is waiting for controlled clients to close",
                generation
            );
            return Ok(None);
        }
        self.on_activate().map(Some)
    }

    /// 拦截一次请求
    pub async fn on_fetch(&self, request: FetchRequest) -> Result<Served, FetchError> {
        if let Some(reason) = self.policy.passthrough(&request) {
            debug!("Passthrough {:?}: {} {}", reason, request.method, request.url);
            return self.passthrough(&request, reason).await;
        }
        let Some(generation) = self.registration.active_generation() else {
            return self.passthrough(&request, Passthrough::Uncontrolled).await;
        };

        let key = request.key();
        if let Some(store) = self.storage().get(&generation)
            && let Some(response) = store.match_request(&key)
        {
            debug!("Cache hit {}", key);
            return Ok(Served {
                response,
                source: Source::Cache,
            });
        }

        debug!("Cache miss {}", key);
        match self.fetcher.fetch(&request).await {
            Ok(response)
                if response.is_cacheable() && self.policy.is_cacheable_asset(&request.url) =>
            {
                let (response, copy) = response.tee();
                self.store_later(generation, key, copy);
                Ok(Served {
                    response,
                    source: Source::Network,
                })
            }
            Ok(response) => Ok(Served {
                response,
                source: Source::Network,
            }),
            Err(err) if request.is_root_navigation(&self.origin) => {
                warn!("Navigation to {} failed, serving offline page: {}", request.url, err);
                Ok(Served {
                    response: CapturedResponse::offline(self.offline_document.clone()),
                    source: Source::Fallback,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn passthrough(
        &self,
        request: &FetchRequest,
        reason: Passthrough,
    ) -> Result<Served, FetchError> {
        let response = self.fetcher.fetch(request).await?;
        Ok(Served {
            response,
            source: Source::Passthrough(reason),
        })
    }

    /// 在后台写入缓存，失败只记录日志
    fn store_later(&self, generation: String, key: RequestKey, response: CapturedResponse) {
        let storage = self.storage().clone();
        self.writes.spawn(async move {
            match storage.get(&generation) {
                Some(store) => {
                    debug!("Cached {} in {}", key, generation);
                    store.put(key, response);
                }
                None => warn!("Cache {} is gone, dropped {}", generation, key),
            }
        });
    }

    /// 等待所有后台缓存写入完成
    pub async fn settle(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    /// 处理控制通道消息，返回是否被识别
    pub fn on_message(&self, message: ControlMessage) -> bool {
        match message {
            ControlMessage::SkipWaiting => {
                match self.registration.skip_waiting() {
                    Ok(Some(generation)) => info!("Skip waiting, activated {}", generation),
                    Ok(None) => {}
                    Err(err) => warn!("Skip waiting failed: {}", err),
                }
                true
            }
            ControlMessage::Unknown(kind) => {
                debug!("Ignored unknown control message {:?}", kind);
                false
            }
        }
    }
}
