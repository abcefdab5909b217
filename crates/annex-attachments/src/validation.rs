//! Upload validation
//!
//! Runs against freshly sniffed file attributes, never against stale meta.
//! Validation fails fast: the first violated constraint is reported and the
//! remaining checks are skipped.

use annex_core::{AttachmentsConfig, ValidationErrors};

use crate::model::FileMeta;
use crate::policy::EffectivePolicy;

/// Maximum length of an attachment's display name.
pub const MAX_NAME_LEN: usize = 255;

/// Validate an upload's name, context and sniffed file attributes against
/// the owner's effective policy.
///
/// The context passed here must already have the default substituted; an
/// empty context is always accepted.
pub fn validate_upload(
    name: &str,
    context: &str,
    meta: &FileMeta,
    policy: &EffectivePolicy,
    config: &AttachmentsConfig,
) -> Result<(), ValidationErrors> {
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationErrors::single(
            "name",
            "max_length",
            format!("Name longer than {} characters!", MAX_NAME_LEN),
        ));
    }

    if !context.is_empty() && !config.is_valid_context(context) {
        let valid: Vec<&str> = config.valid_contexts().into_iter().collect();
        return Err(ValidationErrors::single(
            "context",
            "invalid_context",
            format!(
                "Invalid context {} detected! It must be one of the following: {}",
                context,
                valid.join(", ")
            ),
        ));
    }

    if let Some(valid_mime_types) = &policy.valid_mime_types {
        if !valid_mime_types.contains(&meta.mime_type) {
            let mut valid: Vec<&str> = valid_mime_types.iter().map(String::as_str).collect();
            valid.sort_unstable();
            return Err(ValidationErrors::single(
                "file",
                "invalid_mime_type",
                format!(
                    "Invalid mime type {} detected! It must be one of the following: {}",
                    meta.mime_type,
                    valid.join(", ")
                ),
            ));
        }
    }

    if let Some(valid_extensions) = &policy.valid_extensions {
        if !valid_extensions.contains(&meta.extension) {
            let mut valid: Vec<&str> = valid_extensions.iter().map(String::as_str).collect();
            valid.sort_unstable();
            return Err(ValidationErrors::single(
                "file",
                "invalid_extension",
                format!(
                    "Invalid extension {} detected! It must be one of the following: {}",
                    meta.extension,
                    valid.join(", ")
                ),
            ));
        }
    }

    if meta.size < policy.min_size {
        return Err(ValidationErrors::single(
            "file",
            "too_small",
            format!(
                "File size {} too small! It must be at least {}",
                meta.size, policy.min_size
            ),
        ));
    }

    if meta.size > policy.max_size {
        return Err(ValidationErrors::single(
            "file",
            "too_large",
            format!(
                "File size {} too large! It can only be {}",
                meta.size, policy.max_size
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AttachmentPolicy, PolicyRegistry};

    fn meta(mime_type: &str, extension: &str, size: u64) -> FileMeta {
        FileMeta {
            mime_type: mime_type.to_string(),
            extension: extension.to_string(),
            size,
        }
    }

    fn resolve(policy: AttachmentPolicy, ceiling: u64) -> EffectivePolicy {
        PolicyRegistry::new()
            .register("owner", policy)
            .resolve("owner", ceiling)
    }

    #[test]
    fn test_unrestricted_policy_accepts_anything() {
        let policy = resolve(AttachmentPolicy::new(), 10_000);
        let config = AttachmentsConfig::default();

        let result = validate_upload(
            "x",
            "",
            &meta("application/octet-stream", ".bin", 500),
            &policy,
            &config,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_context() {
        let policy = resolve(AttachmentPolicy::new(), 10_000);
        let config = AttachmentsConfig::default().with_context("avatar", "Avatar");

        let err = validate_upload("x", "banner", &meta("image/png", ".png", 10), &policy, &config)
            .unwrap_err();
        assert!(err.has_code("context", "invalid_context"));
    }

    #[test]
    fn test_empty_context_is_accepted() {
        let policy = resolve(AttachmentPolicy::new(), 10_000);
        let config = AttachmentsConfig::default().with_context("avatar", "Avatar");

        assert!(validate_upload("x", "", &meta("image/png", ".png", 10), &policy, &config).is_ok());
    }

    #[test]
    fn test_invalid_mime_type() {
        let policy = resolve(
            AttachmentPolicy::new().valid_mime_types(["image/svg+xml"]),
            10_000,
        );
        let config = AttachmentsConfig::default();

        let err = validate_upload("x", "", &meta("image/png", ".svg", 10), &policy, &config)
            .unwrap_err();
        assert!(err.has_code("file", "invalid_mime_type"));
    }

    #[test]
    fn test_invalid_extension() {
        let policy = resolve(AttachmentPolicy::new().valid_extensions([".svg"]), 10_000);
        let config = AttachmentsConfig::default();

        let err = validate_upload("x", "", &meta("image/svg+xml", ".png", 10), &policy, &config)
            .unwrap_err();
        assert!(err.has_code("file", "invalid_extension"));
    }

    #[test]
    fn test_size_bounds_fail() {
        let policy = resolve(AttachmentPolicy::new().min_size(1000).max_size(10_000), 100_000);
        let config = AttachmentsConfig::default();

        let too_small =
            validate_upload("x", "", &meta("text/plain", ".txt", 703), &policy, &config)
                .unwrap_err();
        assert!(too_small.has_code("file", "too_small"));

        let too_large =
            validate_upload("x", "", &meta("text/plain", ".txt", 10_001), &policy, &config)
                .unwrap_err();
        assert!(too_large.has_code("file", "too_large"));
    }

    #[test]
    fn test_exact_boundaries_pass() {
        let policy = resolve(AttachmentPolicy::new().min_size(1000).max_size(10_000), 100_000);
        let config = AttachmentsConfig::default();

        assert!(
            validate_upload("x", "", &meta("text/plain", ".txt", 1000), &policy, &config).is_ok()
        );
        assert!(
            validate_upload("x", "", &meta("text/plain", ".txt", 10_000), &policy, &config).is_ok()
        );
    }

    #[test]
    fn test_global_ceiling_applies_without_declared_max() {
        let policy = resolve(AttachmentPolicy::new(), 2_000);
        let config = AttachmentsConfig::default();

        let err = validate_upload("x", "", &meta("text/plain", ".txt", 2_001), &policy, &config)
            .unwrap_err();
        assert!(err.has_code("file", "too_large"));
    }

    #[test]
    fn test_name_too_long() {
        let policy = resolve(AttachmentPolicy::new(), 10_000);
        let config = AttachmentsConfig::default();
        let name = "n".repeat(MAX_NAME_LEN + 1);

        let err = validate_upload(&name, "", &meta("text/plain", ".txt", 10), &policy, &config)
            .unwrap_err();
        assert!(err.has_code("name", "max_length"));
    }

    #[test]
    fn test_fails_fast_on_first_violation() {
        // Both the mime type and the size are wrong; only the mime type is
        // reported.
        let policy = resolve(
            AttachmentPolicy::new()
                .valid_mime_types(["image/svg+xml"])
                .min_size(1000),
            10_000,
        );
        let config = AttachmentsConfig::default();

        let err = validate_upload("x", "", &meta("image/png", ".svg", 1), &policy, &config)
            .unwrap_err();
        assert!(err.has_code("file", "invalid_mime_type"));
        assert!(!err.has_code("file", "too_small"));
    }
}
