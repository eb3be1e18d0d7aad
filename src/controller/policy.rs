use globset::{Glob, GlobSet, GlobSetBuilder};
use http::Method;
use url::{Origin, Url};

use super::request::FetchRequest;
use crate::error::Result;

/// 不允许拦截的源
///
/// `deny` 中的源永远放行到网络；`allow` 非空时，不在其中的源同样放行。
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    deny: Vec<Origin>,
    allow: Vec<Origin>,
}

impl ExclusionRules {
    pub fn new(deny: &[String], allow: &[String]) -> Result<Self> {
        Ok(Self {
            deny: parse_origins(deny)?,
            allow: parse_origins(allow)?,
        })
    }

    pub fn is_excluded(&self, url: &Url) -> bool {
        let origin = url.origin();
        if self.deny.contains(&origin) {
            return true;
        }
        !self.allow.is_empty() && !self.allow.contains(&origin)
    }
}

fn parse_origins(origins: &[String]) -> Result<Vec<Origin>> {
    origins
        .iter()
        .map(|origin| Ok(Url::parse(origin)?.origin()))
        .collect()
}

/// 可缓存的构建产物：脚本、样式、图片、图标、字体，或静态目录下的任意文件
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    static_dirs: GlobSet,
}

impl AssetMatcher {
    pub fn new(static_dirs: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in static_dirs {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            static_dirs: builder.build()?,
        })
    }

    pub fn is_asset(&self, url: &Url) -> bool {
        let path = url.path();
        if self.static_dirs.is_match(path) {
            return true;
        }
        mime_guess::from_path(path).iter().any(|mime| {
            matches!(mime.type_().as_str(), "image" | "font")
                || matches!(
                    mime.essence_str(),
                    "text/css" | "text/javascript" | "application/javascript"
                )
        })
    }
}

/// 不拦截的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passthrough {
    /// 非 GET 请求必须到达服务器
    Mutation,
    /// 命中排除规则
    Excluded,
    /// 还没有激活的缓存代
    Uncontrolled,
}

#[derive(Debug, Clone)]
pub struct InterceptPolicy {
    exclusions: ExclusionRules,
    assets: AssetMatcher,
}

impl InterceptPolicy {
    pub fn new(exclusions: ExclusionRules, assets: AssetMatcher) -> Self {
        Self { exclusions, assets }
    }

    /// 判断请求是否允许被拦截，返回放行原因
    pub fn passthrough(&self, request: &FetchRequest) -> Option<Passthrough> {
        if request.method != Method::GET {
            return Some(Passthrough::Mutation);
        }
        if self.exclusions.is_excluded(&request.url) {
            return Some(Passthrough::Excluded);
        }
        None
    }

    pub fn is_cacheable_asset(&self, url: &Url) -> bool {
        self.assets.is_asset(url)
    }
}
