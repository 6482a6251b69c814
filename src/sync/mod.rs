//! Reading-list synchronization: document import, redirect resolution,
//! and serialized delta application.
//!
//! The pieces here are the collaborators of `ReadingListUpdateTask`:
//!
//! - [`ListImporter`] - fetches a list's remote representation;
//!   [`HttpListImporter`] is the OPML-over-HTTP implementation
//! - [`RedirectResolver`] - walks HTTP redirect chains with cycle
//!   detection, used to tell "feed moved" apart from "feed replaced"
//! - [`DeltaApplier`] - the single coordinating actor through which all
//!   tree mutation is funneled

mod apply;
mod importer;
mod opml;
mod redirect;

pub use apply::{ApplyError, DeltaApplier, MembershipMutator, TreeMutator};
pub use importer::{HttpListImporter, ImportError, ListDocument, ListEntry, ListImporter};
pub use opml::parse_list_content;
pub use redirect::{RedirectResolver, ResolveError};
