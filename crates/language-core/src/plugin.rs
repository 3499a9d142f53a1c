use anyhow::Result;
use url::Url;

use crate::snapshot::Snapshot;
use crate::virtual_code::VirtualCode;

/// A generator turning source scripts of some notation into virtual-code
/// trees.
///
/// Plugins are consulted in registration order; the first one whose
/// [`create_virtual_code`](Self::create_virtual_code) returns `Ok(Some(..))`
/// owns the script's generated state from then on. `Ok(None)` means the
/// plugin does not handle this script, `Err(..)` means generation failed —
/// the registry logs it and the script keeps no generated tree for this
/// update.
pub trait LanguagePlugin: Send + Sync {
    /// Stable identity used in log messages.
    fn name(&self) -> &str;

    /// Resolve the notation tag of a script the host never opened, from its
    /// id alone (typically the extension). `None` when unrecognized.
    fn language_id(&self, script_id: &Url) -> Option<String>;

    fn create_virtual_code(
        &self,
        script_id: &Url,
        language_id: &str,
        snapshot: &Snapshot,
    ) -> Result<Option<VirtualCode>>;

    /// Incrementally rebuild a tree from its predecessor. The default has no
    /// incremental path and returns `Ok(None)`, which makes the registry fall
    /// back to a full [`create_virtual_code`](Self::create_virtual_code).
    fn update_virtual_code(
        &self,
        script_id: &Url,
        previous: &VirtualCode,
        new_snapshot: &Snapshot,
    ) -> Result<Option<VirtualCode>> {
        let _ = (script_id, previous, new_snapshot);
        Ok(None)
    }

    /// Cleanup hook invoked when the script is deleted from the registry.
    fn dispose_virtual_code(&self, script_id: &Url, root: &VirtualCode) {
        let _ = (script_id, root);
    }
}
