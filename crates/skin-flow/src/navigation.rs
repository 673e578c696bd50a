use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// The camera setup screen moves on by itself after this long
pub const CAMERA_SETUP_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Screen {
    Landing,
    Intake,
    CaptureMethod,
    CameraSetup,
    CameraCapture,
    AnalysisMenu,
    Summary,
}

impl Screen {
    /// Screens that hold the camera open
    pub fn uses_camera(&self) -> bool {
        matches!(self, Screen::CameraSetup | Screen::CameraCapture)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    TakeTest,
    Proceed,
    OpenCamera,
    OpenGallery,
    CameraReady,
    UsePhoto,
    Demographics,
    Home,
    /// The screen's own back link
    Back,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("{action:?} is not available on {screen:?}")]
    NoRoute { screen: Screen, action: Action },
}

/// Where `action` leads from `screen`, if anywhere
pub fn route(screen: Screen, action: Action) -> Option<Screen> {
    use Action::*;
    use Screen::*;
    match (screen, action) {
        (Landing, TakeTest) => Some(Intake),
        (Intake, Back) => Some(Landing),
        (Intake, Proceed) => Some(CaptureMethod),
        (CaptureMethod, Back) => Some(Intake),
        (CaptureMethod, OpenCamera) => Some(CameraSetup),
        (CaptureMethod, OpenGallery) => Some(AnalysisMenu),
        (CameraSetup, CameraReady) => Some(CameraCapture),
        (CameraCapture, Back) => Some(CaptureMethod),
        (CameraCapture, UsePhoto) => Some(AnalysisMenu),
        (AnalysisMenu, Back) => Some(CaptureMethod),
        (AnalysisMenu, Demographics) => Some(Summary),
        (Summary, Back) => Some(CaptureMethod),
        (Summary, Home) => Some(Landing),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Navigator {
    current: Screen,
    history: Vec<Screen>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            current: Screen::Landing,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> Screen {
        self.current
    }

    pub fn history(&self) -> &[Screen] {
        &self.history
    }

    pub fn can(&self, action: Action) -> bool {
        route(self.current, action).is_some()
    }

    pub fn apply(&mut self, action: Action) -> Result<Screen, NavigationError> {
        let next = route(self.current, action).ok_or(NavigationError::NoRoute {
            screen: self.current,
            action,
        })?;

        match action {
            // Back links and home unwind to an earlier visit if there is one
            Action::Back | Action::Home => match self.history.iter().rposition(|s| *s == next) {
                Some(i) => self.history.truncate(i),
                None => self.history.push(self.current),
            },
            _ => self.history.push(self.current),
        }

        debug!("Screen {:?} -> {:?} ({:?})", self.current, next, action);
        self.current = next;
        Ok(next)
    }

    /// History back. Lands on `Landing` when there is nothing to pop.
    /// The camera setup screen forwards on its own, so it is skipped.
    pub fn back(&mut self) -> Screen {
        let mut previous = self.history.pop().unwrap_or(Screen::Landing);
        while previous == Screen::CameraSetup {
            previous = self.history.pop().unwrap_or(Screen::Landing);
        }
        debug!("Screen {:?} -> {:?} (history back)", self.current, previous);
        self.current = previous;
        previous
    }

    pub fn reset(&mut self) {
        self.current = Screen::Landing;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_path() {
        let mut nav = Navigator::new();
        nav.apply(Action::TakeTest).unwrap();
        nav.apply(Action::Proceed).unwrap();
        nav.apply(Action::OpenCamera).unwrap();
        assert_eq!(nav.apply(Action::CameraReady).unwrap(), Screen::CameraCapture);
        assert_eq!(nav.apply(Action::UsePhoto).unwrap(), Screen::AnalysisMenu);
        assert_eq!(nav.apply(Action::Demographics).unwrap(), Screen::Summary);
        assert_eq!(nav.apply(Action::Home).unwrap(), Screen::Landing);
        assert!(nav.history().is_empty());
    }

    #[test]
    fn test_gallery_skips_camera() {
        let mut nav = Navigator::new();
        nav.apply(Action::TakeTest).unwrap();
        nav.apply(Action::Proceed).unwrap();
        assert_eq!(nav.apply(Action::OpenGallery).unwrap(), Screen::AnalysisMenu);
        assert_eq!(nav.apply(Action::Back).unwrap(), Screen::CaptureMethod);
        assert_eq!(
            nav.history(),
            &[Screen::Landing, Screen::Intake]
        );
    }

    #[test]
    fn test_summary_back_goes_to_capture_method() {
        let mut nav = Navigator::new();
        for action in [
            Action::TakeTest,
            Action::Proceed,
            Action::OpenGallery,
            Action::Demographics,
        ] {
            nav.apply(action).unwrap();
        }
        assert_eq!(nav.apply(Action::Back).unwrap(), Screen::CaptureMethod);
    }

    #[test]
    fn test_invalid_action() {
        let mut nav = Navigator::new();
        let err = nav.apply(Action::UsePhoto).unwrap_err();
        assert_eq!(
            err,
            NavigationError::NoRoute {
                screen: Screen::Landing,
                action: Action::UsePhoto
            }
        );
        assert_eq!(nav.current(), Screen::Landing);
        assert!(!nav.can(Action::Back));
    }

    #[test]
    fn test_history_back_after_denial() {
        let mut nav = Navigator::new();
        nav.apply(Action::TakeTest).unwrap();
        nav.apply(Action::Proceed).unwrap();
        nav.apply(Action::OpenCamera).unwrap();
        nav.apply(Action::CameraReady).unwrap();
        assert!(nav.current().uses_camera());
        assert_eq!(nav.back(), Screen::CaptureMethod);
        assert_eq!(nav.history(), &[Screen::Landing, Screen::Intake]);
    }

    #[test]
    fn test_history_back_with_empty_history() {
        let mut nav = Navigator::new();
        assert_eq!(nav.back(), Screen::Landing);
        assert_eq!(nav.current(), Screen::Landing);
    }
}
