use crate::error::Result;

/// Environment signals the violation monitor and time accountant react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    FullscreenEntered,
    FullscreenExited,
    WindowBlurred,
    WindowFocused,
    PageHidden,
    PageVisible,
    Unloading,
}

/// What the session needs from the host environment.
pub trait Platform: Send {
    fn is_fullscreen(&self) -> bool;

    fn request_fullscreen(&mut self) -> Result<()>;

    /// Called with every event the host delivered, before the session reacts.
    fn observe(&mut self, _event: PlatformEvent) {}
}

/// Platform for terminals and tests: fullscreen is a flag that flips on request.
#[derive(Debug, Default, Clone)]
pub struct HeadlessPlatform {
    fullscreen: bool,
    requests: u32,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fullscreen_requests(&self) -> u32 {
        self.requests
    }
}

impl Platform for HeadlessPlatform {
    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        self.requests += 1;
        self.fullscreen = true;
        tracing::debug!(requests = self.requests, "fullscreen requested");
        Ok(())
    }

    fn observe(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::FullscreenEntered => self.fullscreen = true,
            PlatformEvent::FullscreenExited => self.fullscreen = false,
            _ => {}
        }
    }
}

/// Document state sampled when a browser event fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentState {
    pub fullscreen: bool,
    pub hidden: bool,
}

/// Folds the browser's vendor-specific event names into [`PlatformEvent`]s.
pub struct BrowserEvents;

impl BrowserEvents {
    pub fn translate(name: &str, state: DocumentState) -> Option<PlatformEvent> {
        match name {
            "fullscreenchange"
            | "webkitfullscreenchange"
            | "mozfullscreenchange"
            | "MSFullscreenChange" => Some(if state.fullscreen {
                PlatformEvent::FullscreenEntered
            } else {
                PlatformEvent::FullscreenExited
            }),
            "blur" => Some(PlatformEvent::WindowBlurred),
            "focus" => Some(PlatformEvent::WindowFocused),
            "visibilitychange" => Some(if state.hidden {
                PlatformEvent::PageHidden
            } else {
                PlatformEvent::PageVisible
            }),
            "beforeunload" | "pagehide" => Some(PlatformEvent::Unloading),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_fullscreen_events_collapse_into_one_kind() {
        let exited = DocumentState::default();
        for name in [
            "fullscreenchange",
            "webkitfullscreenchange",
            "mozfullscreenchange",
            "MSFullscreenChange",
        ] {
            assert_eq!(
                BrowserEvents::translate(name, exited),
                Some(PlatformEvent::FullscreenExited)
            );
        }
        let entered = DocumentState {
            fullscreen: true,
            hidden: false,
        };
        assert_eq!(
            BrowserEvents::translate("webkitfullscreenchange", entered),
            Some(PlatformEvent::FullscreenEntered)
        );
    }

    #[test]
    fn visibility_and_unload_events() {
        let hidden = DocumentState {
            fullscreen: true,
            hidden: true,
        };
        assert_eq!(
            BrowserEvents::translate("visibilitychange", hidden),
            Some(PlatformEvent::PageHidden)
        );
        assert_eq!(
            BrowserEvents::translate("visibilitychange", DocumentState::default()),
            Some(PlatformEvent::PageVisible)
        );
        assert_eq!(
            BrowserEvents::translate("pagehide", hidden),
            Some(PlatformEvent::Unloading)
        );
        assert_eq!(BrowserEvents::translate("resize", hidden), None);
    }

    #[test]
    fn headless_platform_enters_fullscreen_on_request() {
        let mut platform = HeadlessPlatform::new();
        assert!(!platform.is_fullscreen());
        platform.request_fullscreen().unwrap();
        assert!(platform.is_fullscreen());
        platform.observe(PlatformEvent::FullscreenExited);
        assert!(!platform.is_fullscreen());
        assert_eq!(platform.fullscreen_requests(), 1);
    }
}
