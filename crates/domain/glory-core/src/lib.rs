pub mod draft;
pub mod record;
pub mod route;
pub mod section;
pub mod snapshot;

pub use draft::{duplicate_display_name, Attachment, CvDraft, CvFields, DraftKey};
pub use record::{most_recent, Identity, RecordPayload, RemoteRecord, Scope, UserId};
pub use route::{match_fragment, match_path, RouteMatch, SpecialTarget};
pub use section::{Access, ParseSectionError, Section, SpecialRoute, SubView, ViewState};
pub use snapshot::{IntentFlags, SignalSnapshot, UserActions};

/// Template assigned to drafts that never picked one explicitly.
pub const DEFAULT_TEMPLATE_ID: &str = "template1";
