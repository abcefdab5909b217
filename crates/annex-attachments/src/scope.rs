//! Access scoping
//!
//! A pluggable seam, not an authorization engine: the host application
//! decides which attachments a caller may view, edit or delete, usually by
//! consulting the owning entity's own access rules. The default scope is
//! identity (no narrowing).

use std::sync::Arc;

use crate::model::Attachment;

/// Opaque caller identity. The host maps its own user model onto this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerRef {
    pub id: String,
}

impl CallerRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Caller-scoped visibility predicates over attachment records.
pub trait AccessScope: Send + Sync {
    fn viewable(&self, caller: &CallerRef, attachment: &Attachment) -> bool {
        let _ = (caller, attachment);
        true
    }

    fn editable(&self, caller: &CallerRef, attachment: &Attachment) -> bool {
        let _ = (caller, attachment);
        true
    }

    fn deletable(&self, caller: &CallerRef, attachment: &Attachment) -> bool {
        let _ = (caller, attachment);
        true
    }
}

/// Default scope: every caller sees everything.
pub struct OpenAccess;

impl AccessScope for OpenAccess {}

type ScopeFn = Arc<dyn Fn(&CallerRef, &Attachment) -> bool + Send + Sync>;

/// Closure-backed scope for hosts that configure the three predicates
/// independently. Unset predicates default to identity.
#[derive(Default)]
pub struct CallbackScope {
    viewable: Option<ScopeFn>,
    editable: Option<ScopeFn>,
    deletable: Option<ScopeFn>,
}

impl CallbackScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewable<F>(mut self, f: F) -> Self
    where
        F: Fn(&CallerRef, &Attachment) -> bool + Send + Sync + 'static,
    {
        self.viewable = Some(Arc::new(f));
        self
    }

    pub fn editable<F>(mut self, f: F) -> Self
    where
        F: Fn(&CallerRef, &Attachment) -> bool + Send + Sync + 'static,
    {
        self.editable = Some(Arc::new(f));
        self
    }

    pub fn deletable<F>(mut self, f: F) -> Self
    where
        F: Fn(&CallerRef, &Attachment) -> bool + Send + Sync + 'static,
    {
        self.deletable = Some(Arc::new(f));
        self
    }
}

impl AccessScope for CallbackScope {
    fn viewable(&self, caller: &CallerRef, attachment: &Attachment) -> bool {
        self.viewable
            .as_ref()
            .map(|f| f(caller, attachment))
            .unwrap_or(true)
    }

    fn editable(&self, caller: &CallerRef, attachment: &Attachment) -> bool {
        self.editable
            .as_ref()
            .map(|f| f(caller, attachment))
            .unwrap_or(true)
    }

    fn deletable(&self, caller: &CallerRef, attachment: &Attachment) -> bool {
        self.deletable
            .as_ref()
            .map(|f| f(caller, attachment))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileMeta, OwnerRef};
    use chrono::Utc;
    use uuid::Uuid;

    fn attachment(owner_key: &str) -> Attachment {
        let now = Utc::now();
        Attachment {
            id: Uuid::new_v4(),
            name: String::new(),
            context: String::new(),
            meta: FileMeta {
                mime_type: "text/plain".to_string(),
                extension: ".txt".to_string(),
                size: 1,
            },
            file_key: "attachments/202608/k.txt".to_string(),
            owner: OwnerRef::new("doc", owner_key),
            creation_date: now,
            last_modification_date: now,
        }
    }

    #[test]
    fn test_open_access_allows_everything() {
        let scope = OpenAccess;
        let caller = CallerRef::new("anyone");
        let a = attachment("1");

        assert!(scope.viewable(&caller, &a));
        assert!(scope.editable(&caller, &a));
        assert!(scope.deletable(&caller, &a));
    }

    #[test]
    fn test_callback_scope_narrows_only_configured_predicates() {
        let scope = CallbackScope::new().deletable(|caller, a| caller.id == a.owner.key);
        let owner_caller = CallerRef::new("1");
        let other_caller = CallerRef::new("2");
        let a = attachment("1");

        assert!(AccessScope::viewable(&scope, &other_caller, &a));
        assert!(AccessScope::editable(&scope, &other_caller, &a));
        assert!(AccessScope::deletable(&scope, &owner_caller, &a));
        assert!(!AccessScope::deletable(&scope, &other_caller, &a));
    }
}
