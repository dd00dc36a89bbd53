//! Browser families and per-profile WebDriver capabilities.

use std::fmt;
use std::path::Path;

use serde_json::{json, Map, Value};

/// Width of every browser viewport.
pub const VIEWPORT_WIDTH: u32 = 1920;

/// Height of every browser viewport.
pub const VIEWPORT_HEIGHT: u32 = 1080;

/// Screen position of stream windows, outside the visible area.
pub const OFF_SCREEN_POSITION: (i32, i32) = (-2000, -2000);

/// Browser engines we know how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Chrome,
    Firefox,
}

impl BrowserFamily {
    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
        }
    }

    /// Title of the top-level window showing a page titled `page_title`.
    pub fn window_title(self, page_title: &str) -> String {
        match self {
            Self::Chrome => format!("{page_title} - Google Chrome"),
            Self::Firefox => format!("{page_title} \u{2014} Mozilla Firefox"),
        }
    }
}

impl fmt::Display for BrowserFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a browser instance is launched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchProfile {
    /// Shared headless instance used for screenshots.
    Preview,

    /// Dedicated instance captured by the encoder. Needs a real window.
    Stream,

    /// Throwaway instance for the browser self-test.
    Diagnostic,
}

/// Build the WebDriver capabilities for a family and profile.
pub fn capabilities(
    family: BrowserFamily,
    profile: LaunchProfile,
    chrome_binary: Option<&Path>,
) -> Map<String, Value> {
    let mut caps = Map::new();
    caps.insert("pageLoadStrategy".into(), json!("normal"));

    match family {
        BrowserFamily::Chrome => {
            let mut options = Map::new();
            options.insert("args".into(), json!(chrome_args(profile)));
            if profile == LaunchProfile::Stream {
                options.insert(
                    "excludeSwitches".into(),
                    json!(["enable-automation", "enable-logging"]),
                );
                options.insert("useAutomationExtension".into(), json!(false));
            }
            if let Some(binary) = chrome_binary {
                options.insert("binary".into(), json!(binary.to_string_lossy()));
            }
            caps.insert("browserName".into(), json!("chrome"));
            caps.insert("goog:chromeOptions".into(), Value::Object(options));
        }
        BrowserFamily::Firefox => {
            caps.insert("browserName".into(), json!("firefox"));
            caps.insert(
                "moz:firefoxOptions".into(),
                json!({ "args": firefox_args(profile) }),
            );
        }
    }

    caps
}

fn chrome_args(profile: LaunchProfile) -> Vec<String> {
    let window_size = format!("--window-size={VIEWPORT_WIDTH},{VIEWPORT_HEIGHT}");

    match profile {
        LaunchProfile::Preview => vec![
            "--headless=new".into(),
            "--no-sandbox".into(),
            "--disable-dev-shm-usage".into(),
            "--disable-gpu".into(),
            window_size,
            "--force-device-scale-factor=1".into(),
        ],
        LaunchProfile::Diagnostic => vec!["--headless=new".into(), "--no-sandbox".into()],
        // Screen capture reads pixels from a real surface, so the window is
        // moved off the visible area instead of running headless.
        LaunchProfile::Stream => vec![
            "--no-sandbox".into(),
            "--disable-dev-shm-usage".into(),
            "--disable-gpu".into(),
            "--disable-software-rasterizer".into(),
            "--disable-background-timer-throttling".into(),
            "--disable-backgrounding-occluded-windows".into(),
            "--disable-renderer-backgrounding".into(),
            "--disable-features=TranslateUI".into(),
            "--disable-ipc-flooding-protection".into(),
            window_size,
            format!(
                "--window-position={},{}",
                OFF_SCREEN_POSITION.0, OFF_SCREEN_POSITION.1
            ),
            "--force-device-scale-factor=1".into(),
            "--run-all-compositor-stages-before-draw".into(),
            "--disable-extensions".into(),
            "--disable-default-apps".into(),
            "--disable-blink-features=AutomationControlled".into(),
        ],
    }
}

// Firefox has no start-up position flag. Its stream window is moved
// off-screen over WebDriver once the session exists.
fn firefox_args(profile: LaunchProfile) -> Vec<String> {
    let mut args = Vec::with_capacity(3);
    if profile != LaunchProfile::Stream {
        args.push("--headless".to_string());
    }
    args.push(format!("--width={VIEWPORT_WIDTH}"));
    args.push(format!("--height={VIEWPORT_HEIGHT}"));
    args
}

/// Whether a browser launched with `caps` runs without a window.
pub fn is_headless(caps: &Map<String, Value>) -> bool {
    ["goog:chromeOptions", "moz:firefoxOptions"]
        .iter()
        .filter_map(|key| caps.get(*key)?.get("args")?.as_array())
        .flatten()
        .filter_map(Value::as_str)
        .any(|arg| arg.starts_with("--headless"))
}

/// Whether the window must be moved off-screen after launch.
pub fn needs_window_move(family: BrowserFamily, profile: LaunchProfile) -> bool {
    family == BrowserFamily::Firefox && profile == LaunchProfile::Stream
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chrome_arg_list(caps: &Map<String, Value>) -> Vec<String> {
        caps["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_preview_profile_is_headless() {
        let caps = capabilities(BrowserFamily::Chrome, LaunchProfile::Preview, None);
        let args = chrome_arg_list(&caps);
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert_eq!(caps["browserName"], "chrome");
    }

    #[test]
    fn test_stream_profile_moves_window_off_screen() {
        let caps = capabilities(BrowserFamily::Chrome, LaunchProfile::Stream, None);
        let args = chrome_arg_list(&caps);
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(args.contains(&"--window-position=-2000,-2000".to_string()));
        assert_eq!(caps["goog:chromeOptions"]["useAutomationExtension"], false);
    }

    #[test]
    fn test_chrome_binary_override() {
        let caps = capabilities(
            BrowserFamily::Chrome,
            LaunchProfile::Preview,
            Some(Path::new("/opt/chrome/chrome")),
        );
        assert_eq!(caps["goog:chromeOptions"]["binary"], "/opt/chrome/chrome");
    }

    #[test]
    fn test_firefox_preview_is_headless() {
        let caps = capabilities(BrowserFamily::Firefox, LaunchProfile::Preview, None);
        assert_eq!(caps["browserName"], "firefox");
        assert_eq!(caps["moz:firefoxOptions"]["args"][0], "--headless");
        assert!(is_headless(&caps));
        assert!(!needs_window_move(BrowserFamily::Firefox, LaunchProfile::Preview));
    }

    #[test]
    fn test_stream_profiles_have_a_window() {
        for family in [BrowserFamily::Chrome, BrowserFamily::Firefox] {
            let caps = capabilities(family, LaunchProfile::Stream, None);
            assert!(!is_headless(&caps), "{family} stream browser is headless");
        }

        let caps = capabilities(BrowserFamily::Firefox, LaunchProfile::Stream, None);
        assert_eq!(caps["moz:firefoxOptions"]["args"][0], "--width=1920");
        assert!(needs_window_move(BrowserFamily::Firefox, LaunchProfile::Stream));
        assert!(!needs_window_move(BrowserFamily::Chrome, LaunchProfile::Stream));
    }

    #[test]
    fn test_window_titles() {
        assert_eq!(
            BrowserFamily::Chrome.window_title("sitecast-1"),
            "sitecast-1 - Google Chrome"
        );
        assert!(BrowserFamily::Firefox
            .window_title("sitecast-1")
            .ends_with("Mozilla Firefox"));
    }
}
