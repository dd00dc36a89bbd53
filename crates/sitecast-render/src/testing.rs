//! In-memory browser fakes for tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::browser::{capabilities, is_headless, BrowserFamily, LaunchProfile};
use crate::error::RenderError;
use crate::screenshot::Screenshot;
use crate::{BrowserLauncher, LoadPolicy, RenderInstance, RenderResult};

/// PNG signature followed by a few filler bytes.
pub const FAKE_PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x01];

/// Everything the fake browsers were asked to do.
#[derive(Debug, Clone, Default)]
pub struct FakeBrowserLog {
    pub launches: Vec<LaunchProfile>,
    /// Per launch, whether the real browser would get a window surface.
    pub windowed: Vec<bool>,
    pub loaded: Vec<String>,
    pub titles: Vec<String>,
    pub screenshots: usize,
    pub closed: usize,
}

impl FakeBrowserLog {
    /// Instances launched and not yet closed.
    pub fn open_instances(&self) -> usize {
        self.launches.len() - self.closed
    }
}

/// Knobs controlling how the fakes fail.
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    pub fail_launch: bool,
    pub fail_load: bool,
    pub time_out_load: bool,
    pub page_title: String,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            fail_launch: false,
            fail_load: false,
            time_out_load: false,
            page_title: "Example Domain".to_string(),
        }
    }
}

/// A launcher producing [`FakeInstance`]s and recording their use.
#[derive(Clone)]
pub struct FakeLauncher {
    family: BrowserFamily,
    log: Arc<Mutex<FakeBrowserLog>>,
    behavior: Arc<Mutex<FakeBehavior>>,
}

impl FakeLauncher {
    /// A launcher that always succeeds.
    pub fn new(family: BrowserFamily) -> Self {
        Self {
            family,
            log: Arc::new(Mutex::new(FakeBrowserLog::default())),
            behavior: Arc::new(Mutex::new(FakeBehavior::default())),
        }
    }

    /// A launcher whose launches always fail.
    pub fn failing(family: BrowserFamily) -> Self {
        let launcher = Self::new(family);
        launcher.set_behavior(|b| b.fail_launch = true);
        launcher
    }

    /// Adjust the failure knobs.
    pub fn set_behavior(&self, update: impl FnOnce(&mut FakeBehavior)) {
        update(&mut *self.behavior.lock());
    }

    /// Snapshot of the recorded calls.
    pub fn log(&self) -> FakeBrowserLog {
        self.log.lock().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    fn name(&self) -> &str {
        self.family.name()
    }

    async fn launch(&self, profile: LaunchProfile) -> RenderResult<Box<dyn RenderInstance>> {
        if self.behavior.lock().fail_launch {
            return Err(RenderError::DriverNotFound {
                path: format!("fake-{}driver", self.family.name()),
            });
        }

        let windowed = !is_headless(&capabilities(self.family, profile, None));
        let mut log = self.log.lock();
        log.launches.push(profile);
        log.windowed.push(windowed);
        drop(log);
        Ok(Box::new(FakeInstance {
            family: self.family,
            log: Arc::clone(&self.log),
            behavior: Arc::clone(&self.behavior),
            title: String::new(),
            closed: false,
        }))
    }
}

/// A browser instance that only records calls.
pub struct FakeInstance {
    family: BrowserFamily,
    log: Arc<Mutex<FakeBrowserLog>>,
    behavior: Arc<Mutex<FakeBehavior>>,
    title: String,
    closed: bool,
}

impl FakeInstance {
    fn ensure_open(&self) -> RenderResult<()> {
        if self.closed {
            Err(RenderError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RenderInstance for FakeInstance {
    fn family(&self) -> BrowserFamily {
        self.family
    }

    async fn load(&mut self, url: &str, policy: &LoadPolicy) -> RenderResult<()> {
        self.ensure_open()?;
        let behavior = self.behavior.lock().clone();
        if behavior.time_out_load {
            return Err(RenderError::Timeout(policy.timeout));
        }
        if behavior.fail_load {
            return Err(RenderError::Command(format!("unreachable: {url}")));
        }
        self.title = behavior.page_title;
        self.log.lock().loaded.push(url.to_string());
        Ok(())
    }

    async fn set_title(&mut self, title: &str) -> RenderResult<()> {
        self.ensure_open()?;
        self.title = title.to_string();
        self.log.lock().titles.push(title.to_string());
        Ok(())
    }

    async fn screenshot(&mut self) -> RenderResult<Screenshot> {
        self.ensure_open()?;
        self.log.lock().screenshots += 1;
        Ok(Screenshot::from_png(FAKE_PNG))
    }

    async fn title(&mut self) -> RenderResult<String> {
        self.ensure_open()?;
        Ok(self.title.clone())
    }

    async fn close(&mut self) -> RenderResult<()> {
        if !self.closed {
            self.closed = true;
            self.log.lock().closed += 1;
        }
        Ok(())
    }
}
