use std::sync::Arc;
use crate::error::DownloadError;

pub struct DownloadConfiguration {
    pub url: Option<Arc<String>>,
    pub save_path: Option<Arc<String>>,
    pub total_count: u32,
    pub parallel_count: u32,
    pub retry_times_on_failure: u8,
    pub timeout: u64,
}

pub struct DownloadConfigurationBuilder {
    config: DownloadConfiguration,
}

impl DownloadConfigurationBuilder {
    fn new(config: DownloadConfiguration) -> Self {
        Self {
            config
        }
    }

    pub fn set_url(mut self, url: impl Into<String>) -> DownloadConfigurationBuilder {
        self.config.url = Some(Arc::new(url.into()));
        self
    }

    pub fn set_save_path(mut self, save_path: impl Into<String>) -> DownloadConfigurationBuilder {
        self.config.save_path = Some(Arc::new(save_path.into()));
        self
    }

    pub fn set_total_count(mut self, total_count: u32) -> DownloadConfigurationBuilder {
        self.config.total_count = total_count;
        self
    }

    pub fn set_parallel_count(mut self, parallel_count: u32) -> DownloadConfigurationBuilder {
        self.config.parallel_count = parallel_count;
        self
    }

    pub fn set_retry_times_on_failure(mut self, retry_times: u8) -> DownloadConfigurationBuilder {
        self.config.retry_times_on_failure = retry_times;
        self
    }

    /// Request timeout in seconds. 0 means no timeout.
    pub fn set_timeout(mut self, timeout: u64) -> DownloadConfigurationBuilder {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> crate::error::Result<DownloadConfiguration> {
        self.validate()
    }

    fn validate(self) -> crate::error::Result<DownloadConfiguration> {
        if self.config.url.is_none() {
            return Err(DownloadError::InvalidConfig("download url not set".to_string()));
        }

        if self.config.save_path.is_none() {
            return Err(DownloadError::InvalidConfig("save path not set".to_string()));
        }

        if self.config.parallel_count == 0 {
            return Err(DownloadError::InvalidConfig("parallel count must be at least 1".to_string()));
        }

        Ok(self.config)
    }
}

impl DownloadConfiguration {
    pub fn new() -> DownloadConfigurationBuilder {
        let config = DownloadConfiguration {
            url: None,
            save_path: None,
            total_count: 0,
            parallel_count: 1,
            retry_times_on_failure: 0,
            timeout: 0,
        };
        DownloadConfigurationBuilder::new(config)
    }

    pub fn get_url(&self) -> Arc<String> {
        self.url.as_ref().unwrap().clone()
    }

    pub fn get_save_path(&self) -> Arc<String> {
        self.save_path.as_ref().unwrap().clone()
    }
}
