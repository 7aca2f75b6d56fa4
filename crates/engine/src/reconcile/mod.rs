// Merge algorithms that pull remote state into the local stores.
//
// Remote is authoritative in every reconciler: identities are created or
// overwritten from their remote records and site assignments are overwritten
// without comparing against the local value.

pub mod identities;
pub mod sites;

pub use identities::{reconcile_by_name, reconcile_by_uuid, IdentityReport};
pub use sites::{reconcile_site_assignments, SiteReport};
