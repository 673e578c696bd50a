pub mod navigation;
pub mod ornament;
pub mod store;
pub mod summary;
pub mod wizard;

pub use navigation::{Action, NavigationError, Navigator, Screen, CAMERA_SETUP_DELAY};
pub use ornament::{Scene, SceneFrame};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, CAPTURED_IMAGE_KEY, DEMOGRAPHICS_KEY};
pub use summary::{
    load_estimate, RadialIndicator, Row, SummaryError, SummaryScreen, SummarySnapshot, SummaryView,
};
pub use wizard::{
    run_with_floor, submit_identity, Identity, IntakeWizard, Phase, Step, Transition, WizardError,
    WizardState, WizardView, MIN_SUBMIT_DURATION,
};
