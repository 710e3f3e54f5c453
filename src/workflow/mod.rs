/// Multi-step procedures built from the command and data-stream layers:
/// finger-presence polling, enrol/search/match, and their
/// non-interactive upload-based counterparts.
mod activity;
mod engine;
mod listener;

pub use activity::{Activity, ActivityResult};
pub(crate) use activity::{new_activity, ActivityCompleter};
pub use engine::EnrollBundle;
pub(crate) use engine::{
    capture_and_download_image, enroll, enroll_from_scans, enroll_from_template,
    enroll_with_data, match_slot, search, upload_and_search,
};
pub use listener::{HumanActionListener, NullListener};
