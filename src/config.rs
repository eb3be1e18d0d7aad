use std::{fs, time::Duration};

use globset::Glob;
use serde::Deserialize;
use url::Url;

use crate::{
    consts::{
        FETCH_TIMEOUT_MARGIN, control_prefix, exclude_origins, log_folder, log_level,
        process_timeout, shell_resources, static_dirs,
    },
    error::{Error, Result},
};

#[derive(Deserialize, Clone, Debug)]
pub struct SettingServer {
    pub ip: String,
    pub port: u16,
    /// 请求处理超时（秒）
    #[serde(default = "process_timeout")]
    pub timeout: u16,
    #[serde(default)]
    pub ssl: bool,
    pub certificate: Option<String>,
    pub certificate_key: Option<String>,
}

impl SettingServer {
    /// 访问网络的超时
    ///
    /// 必须短于请求处理超时，根页面导航失败时才来得及返回离线页面。
    pub fn fetch_timeout(&self) -> Duration {
        let total = Duration::from_secs(self.timeout.into());
        total - FETCH_TIMEOUT_MARGIN.min(total / 2)
    }
}

/// 离线缓存控制器配置
#[derive(Deserialize, Clone, Debug)]
pub struct SettingController {
    /// 当前部署的缓存代号，变化即视为新的一代
    pub generation: String,
    /// 静态站点源地址，相对路径请求都会解析到这里
    pub origin: String,
    /// 安装时预先缓存的外壳资源
    #[serde(default = "shell_resources")]
    pub shell: Vec<String>,
    /// 永远不拦截的源
    #[serde(default = "exclude_origins")]
    pub exclude_origins: Vec<String>,
    /// 非空时只拦截这些源
    #[serde(default)]
    pub allow_origins: Vec<String>,
    /// 构建产物目录，匹配的路径视为可缓存资源
    #[serde(default = "static_dirs")]
    pub static_dirs: Vec<String>,
    #[serde(default = "control_prefix")]
    pub control_prefix: String,
    /// 新一代安装完成后立即激活
    #[serde(default)]
    pub skip_waiting: bool,
    /// 自定义离线页面
    pub offline_page: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default = "log_level")]
    pub log_level: String,
    #[serde(default = "log_folder")]
    pub log_folder: String,
    pub server: SettingServer,
    pub controller: SettingController,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self> {
        let file = fs::read_to_string(path)?;
        Self::from_toml(&file)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.server.timeout == 0 {
            return Err(Error::InvalidConfig("timeout must be at least 1 second".into()));
        }
        let controller = &self.controller;
        if controller.generation.trim().is_empty() {
            return Err(Error::InvalidConfig("generation must not be empty".into()));
        }
        Url::parse(&controller.origin)?;
        for origin in controller
            .exclude_origins
            .iter()
            .chain(controller.allow_origins.iter())
        {
            Url::parse(origin)?;
        }
        if let Some(path) = controller.shell.iter().find(|p| !p.starts_with('/')) {
            return Err(Error::InvalidConfig(format!(
                "shell resource {path} must start with '/'"
            )));
        }
        for pattern in &controller.static_dirs {
            Glob::new(pattern)?;
        }
        if !controller.control_prefix.starts_with('/') || controller.control_prefix.len() < 2 {
            return Err(Error::InvalidConfig(format!(
                "control_prefix {} must be a non-root path",
                controller.control_prefix
            )));
        }
        if self.server.ssl
            && (self.server.certificate.is_none() || self.server.certificate_key.is_none())
        {
            return Err(Error::InvalidConfig(
                "ssl enabled but certificate or certificate_key missing".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::API_ORIGIN;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
        [server]
        ip = "127.0.0.1"
        port = 8080

        [controller]
        generation = "attendance-system-v1"
        origin = "http://127.0.0.1:3000"
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let settings = Settings::from_toml(MINIMAL).unwrap();

        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.server.timeout, 75);
        assert!(!settings.server.ssl);

        let controller = &settings.controller;
        assert_eq!(controller.shell, vec!["/", "/manifest.json"]);
        assert_eq!(controller.exclude_origins, vec![API_ORIGIN]);
        assert!(controller.allow_origins.is_empty());
        assert_eq!(controller.control_prefix, "/__offline");
        assert!(!controller.skip_waiting);
        assert!(controller.offline_page.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            log_level = "debug"

            [server]
            ip = "0.0.0.0"
            port = 9000
            timeout = 30

            [controller]
            generation = "v7"
            origin = "http://localhost:3000"
            shell = ["/", "/static/css/main.css"]
            exclude_origins = ["https://api.example.com"]
            skip_waiting = true
            "#,
        )
        .unwrap();

        let settings = Settings::new(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.timeout, 30);
        assert_eq!(settings.controller.generation, "v7");
        assert_eq!(settings.controller.shell.len(), 2);
        assert!(settings.controller.skip_waiting);
    }

    #[test]
    fn test_empty_generation_rejected() {
        let content = MINIMAL.replace("attendance-system-v1", " ");
        assert!(matches!(
            Settings::from_toml(&content),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let content = MINIMAL.replace("http://127.0.0.1:3000", "not a url");
        assert!(matches!(
            Settings::from_toml(&content),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_relative_shell_rejected() {
        let content = format!("{MINIMAL}\nshell = [\"manifest.json\"]\n");
        assert!(matches!(
            Settings::from_toml(&content),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let content = format!("{MINIMAL}\nstatic_dirs = [\"/static/[\"]\n");
        assert!(matches!(Settings::from_toml(&content), Err(Error::Glob(_))));
    }

    #[test]
    fn test_root_control_prefix_rejected() {
        let content = format!("{MINIMAL}\ncontrol_prefix = \"/\"\n");
        assert!(Settings::from_toml(&content).is_err());
    }

    #[test]
    fn test_ssl_without_certificate_rejected() {
        let content = MINIMAL.replace("port = 8080", "port = 8080\nssl = true");
        assert!(Settings::from_toml(&content).is_err());
    }

    #[test]
    fn test_fetch_timeout_shorter_than_timeout() {
        let mut settings = Settings::from_toml(MINIMAL).unwrap();
        assert_eq!(settings.server.fetch_timeout(), Duration::from_secs(74));

        settings.server.timeout = 2;
        assert_eq!(settings.server.fetch_timeout(), Duration::from_secs(1));

        settings.server.timeout = 1;
        assert_eq!(settings.server.fetch_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let content = MINIMAL.replace("port = 8080", "port = 8080\ntimeout = 0");
        assert!(matches!(
            Settings::from_toml(&content),
            Err(Error::InvalidConfig(_))
        ));
    }
}
